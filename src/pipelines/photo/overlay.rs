// SPDX-License-Identifier: GPL-3.0-only

//! Template overlay and caption drawing

use super::text;
use crate::constants::caption;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// How an overlay image is mapped onto the surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayFit {
    /// Scaled to cover the whole surface, ignoring its own aspect ratio
    #[default]
    Stretch,
    /// Scaled to fit inside the surface, centered, aspect ratio kept
    Contain,
}

/// Placement of the overlay on the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl OverlayFit {
    /// Where an overlay of `overlay` size lands on a surface of `surface` size
    pub fn place(&self, overlay: (u32, u32), surface: (u32, u32)) -> OverlayRect {
        let (sw, sh) = surface;
        match self {
            OverlayFit::Stretch => OverlayRect {
                x: 0,
                y: 0,
                width: sw,
                height: sh,
            },
            OverlayFit::Contain => {
                let (ow, oh) = (overlay.0.max(1) as f64, overlay.1.max(1) as f64);
                let overlay_ratio = ow / oh;
                let surface_ratio = sw as f64 / sh.max(1) as f64;

                let (width, height) = if overlay_ratio > surface_ratio {
                    (sw as f64, sw as f64 / overlay_ratio)
                } else {
                    (sh as f64 * overlay_ratio, sh as f64)
                };
                let width = (width.round() as u32).clamp(1, sw.max(1));
                let height = (height.round() as u32).clamp(1, sh.max(1));

                OverlayRect {
                    x: (sw - width) / 2,
                    y: (sh - height) / 2,
                    width,
                    height,
                }
            }
        }
    }
}

/// Draw `overlay` on top of everything already on the canvas
pub fn draw_overlay(canvas: &mut RgbaImage, overlay: &RgbaImage, fit: OverlayFit) {
    let rect = fit.place(overlay.dimensions(), canvas.dimensions());

    let scaled;
    let source = if overlay.dimensions() == (rect.width, rect.height) {
        overlay
    } else {
        scaled = imageops::resize(overlay, rect.width, rect.height, FilterType::Triangle);
        &scaled
    };

    for (x, y, src) in source.enumerate_pixels() {
        let (tx, ty) = (rect.x + x, rect.y + y);
        if tx < canvas.width() && ty < canvas.height() {
            let dst = canvas.get_pixel_mut(tx, ty);
            dst.0 = blend_pixel(dst.0, src.0);
        }
    }
}

/// Caption centered near the bottom, watermark in the bottom-right corner
pub fn draw_captions(canvas: &mut RgbaImage, caption_text: &str, watermark: &str, font_scale: f32) {
    let (width, height) = canvas.dimensions();
    let h = height as f32;
    let font_scale = if font_scale > 0.0 { font_scale } else { 1.0 };

    if !caption_text.trim().is_empty() {
        let max_width = (width as f32 * 0.9) as u32;
        let scale = text::fit_scale(
            caption_text,
            h * caption::CAPTION_SCALE * font_scale,
            max_width,
        );
        let text_w = text::text_width(caption_text, scale) as i64;
        let text_h = (text::GLYPH_SIZE * scale) as i64;
        let x = (width as i64 - text_w) / 2;
        let baseline = height as i64 - (h * caption::CAPTION_BOTTOM_MARGIN) as i64;
        text::draw_text(
            canvas,
            caption_text,
            x,
            baseline - text_h,
            scale,
            caption::TEXT_COLOR,
        );
    }

    if !watermark.trim().is_empty() {
        let margin = (h * caption::WATERMARK_MARGIN) as i64;
        let max_width = (width as f32 * 0.5) as u32;
        let scale = text::fit_scale(
            watermark,
            h * caption::WATERMARK_SCALE * font_scale,
            max_width,
        );
        let text_w = text::text_width(watermark, scale) as i64;
        let text_h = (text::GLYPH_SIZE * scale) as i64;
        let x = width as i64 - margin - text_w;
        let y = height as i64 - margin - text_h;
        let color = [
            caption::TEXT_COLOR[0],
            caption::TEXT_COLOR[1],
            caption::TEXT_COLOR[2],
            200,
        ];
        text::draw_text(canvas, watermark, x, y, scale, color);
    }
}

/// Source-over for straight-alpha RGBA8
///
/// Both pixels are premultiplied, blended, then converted back.
pub fn blend_pixel(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    unpremultiply(over(premultiply(dst), premultiply(src)))
}

fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = add_sat_u8(src[i], mul_div255(u16::from(dst[i]), inv));
    }
    out
}

fn premultiply(p: [u8; 4]) -> [u8; 4] {
    let a = u16::from(p[3]);
    [
        mul_div255(u16::from(p[0]), a),
        mul_div255(u16::from(p[1]), a),
        mul_div255(u16::from(p[2]), a),
        p[3],
    ]
}

fn unpremultiply(p: [u8; 4]) -> [u8; 4] {
    let a = u32::from(p[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [un(p[0]), un(p[1]), un(p[2]), p[3]]
}

fn mul_div255(a: u16, b: u16) -> u8 {
    let prod = u32::from(a) * u32::from(b);
    ((prod + 127) / 255).min(255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
