// SPDX-License-Identifier: GPL-3.0-only

//! Bitmap text rendering for captions and watermarks
//!
//! Glyphs come from the 8x8 public domain font and are scaled by an integer
//! factor, so text stays crisp at any surface size.

use super::overlay::blend_pixel;
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::RgbaImage;

/// Glyph cell size in font pixels
pub const GLYPH_SIZE: u32 = 8;

fn glyph(c: char) -> [u8; 8] {
    let c = match c {
        '\u{2013}' | '\u{2014}' => '-',
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        other => other,
    };
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Width in surface pixels of `text` at `scale`
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH_SIZE * scale
}

/// Integer glyph scale for a target glyph height, shrunk until `text` fits in `max_width`
pub fn fit_scale(text: &str, target_height: f32, max_width: u32) -> u32 {
    let mut scale = ((target_height / GLYPH_SIZE as f32).round() as u32).max(1);
    while scale > 1 && text_width(text, scale) > max_width {
        scale -= 1;
    }
    scale
}

/// Draw `text` with its top-left corner at (`x`, `y`)
///
/// A soft drop shadow is drawn first so light text stays readable on light
/// photos. Pixels outside the surface are clipped.
pub fn draw_text(canvas: &mut RgbaImage, text: &str, x: i64, y: i64, scale: u32, color: [u8; 4]) {
    let offset = (scale as i64 / 2).max(1);
    let shadow = [0, 0, 0, color[3] / 2];
    draw_glyphs(canvas, text, x + offset, y + offset, scale, shadow);
    draw_glyphs(canvas, text, x, y, scale, color);
}

fn draw_glyphs(canvas: &mut RgbaImage, text: &str, x: i64, y: i64, scale: u32, color: [u8; 4]) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let scale = scale as i64;
    let advance = GLYPH_SIZE as i64 * scale;

    for (index, c) in text.chars().enumerate() {
        let origin_x = x + index as i64 * advance;
        if origin_x >= width {
            break;
        }
        if origin_x + advance <= 0 {
            continue;
        }

        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_SIZE as i64 {
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = origin_x + col * scale;
                let py = y + row as i64 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (tx, ty) = (px + dx, py + dy);
                        if tx >= 0 && ty >= 0 && tx < width && ty < height {
                            let dst = canvas.get_pixel_mut(tx as u32, ty as u32);
                            dst.0 = blend_pixel(dst.0, color);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("abc", 2), 48);
        assert_eq!(text_width("", 5), 0);
    }

    #[test]
    fn test_fit_scale_shrinks_long_text() {
        assert_eq!(fit_scale("hi", 48.0, 1000), 6);
        let long = "x".repeat(100);
        assert_eq!(fit_scale(&long, 48.0, 1000), 1);
    }

    #[test]
    fn test_draw_marks_pixels_inside_bounds() {
        let mut canvas = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        draw_text(&mut canvas, "H", 2, 2, 2, [255, 255, 255, 255]);
        assert!(canvas.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn test_draw_clips_off_canvas() {
        let mut canvas = RgbaImage::new(8, 8);
        draw_text(&mut canvas, "WIDE TEXT", -20, -4, 3, [255, 0, 0, 255]);
        draw_text(&mut canvas, "X", 100, 100, 1, [255, 0, 0, 255]);
    }
}
