// SPDX-License-Identifier: MPL-2.0

//! Frame drawing and per-pixel filters
//!
//! The source frame is drawn onto the surface in a single pass that mirrors
//! (when the preview was mirrored) and applies the selected local filter, so
//! the stored pixels are exactly what the user saw.

use crate::app::state::LocalFilter;
use crate::backends::camera::types::CameraFrame;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Draw `frame` onto `canvas`, mirrored and filtered
///
/// `canvas` must already have the frame's dimensions.
pub fn draw_frame(
    canvas: &mut RgbaImage,
    frame: &CameraFrame,
    mirrored: bool,
    filter: Option<LocalFilter>,
) -> Result<(), String> {
    let (width, height) = (frame.width as usize, frame.height as usize);
    if canvas.dimensions() != (frame.width, frame.height) {
        return Err(format!(
            "surface is {}x{}, frame is {}x{}",
            canvas.width(),
            canvas.height(),
            width,
            height
        ));
    }
    if frame.data.len() < width * height * 4 {
        return Err(format!(
            "frame data too small: expected {}, got {}",
            width * height * 4,
            frame.data.len()
        ));
    }

    for (y, row) in canvas
        .as_mut()
        .chunks_exact_mut(width * 4)
        .enumerate()
        .take(height)
    {
        let src_row = &frame.data[y * width * 4..(y + 1) * width * 4];
        for x in 0..width {
            let src_x = if mirrored { width - 1 - x } else { x };
            let src = &src_row[src_x * 4..src_x * 4 + 4];
            let dst = &mut row[x * 4..x * 4 + 4];

            match filter {
                None => dst.copy_from_slice(src),
                Some(filter) => {
                    let mut r = src[0] as f32 / 255.0;
                    let mut g = src[1] as f32 / 255.0;
                    let mut b = src[2] as f32 / 255.0;
                    apply_filter_rgb(&mut r, &mut g, &mut b, filter, x, y, width, height);
                    dst[0] = to_u8(r);
                    dst[1] = to_u8(g);
                    dst[2] = to_u8(b);
                    dst[3] = src[3];
                }
            }
        }
    }

    Ok(())
}

/// Replace the canvas contents with `image`, scaled to the canvas size
pub fn replace_scaled(canvas: &mut RgbaImage, image: &RgbaImage) {
    let (width, height) = canvas.dimensions();
    if image.dimensions() == (width, height) {
        canvas.copy_from_slice(image.as_raw());
    } else {
        let scaled = imageops::resize(image, width, height, FilterType::CatmullRom);
        canvas.copy_from_slice(scaled.as_raw());
    }
}

/// Filter a standalone image in place (preview thumbnails)
pub fn apply_filter_image(image: &mut RgbaImage, filter: LocalFilter) {
    let (width, height) = (image.width() as usize, image.height() as usize);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let Rgba([r8, g8, b8, a]) = *pixel;
        let (mut r, mut g, mut b) = (r8 as f32 / 255.0, g8 as f32 / 255.0, b8 as f32 / 255.0);
        apply_filter_rgb(
            &mut r,
            &mut g,
            &mut b,
            filter,
            x as usize,
            y as usize,
            width,
            height,
        );
        *pixel = Rgba([to_u8(r), to_u8(g), to_u8(b), a]);
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Apply filter effect to RGB values in-place
#[inline]
#[allow(clippy::too_many_arguments)]
fn apply_filter_rgb(
    r: &mut f32,
    g: &mut f32,
    b: &mut f32,
    filter: LocalFilter,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) {
    match filter {
        LocalFilter::Mono => {
            let gray = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            *r = gray;
            *g = gray;
            *b = gray;
        }

        LocalFilter::Sepia => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            *r = (luminance * 1.2 + 0.1).clamp(0.0, 1.0);
            *g = (luminance * 0.9 + 0.05).clamp(0.0, 1.0);
            *b = (luminance * 0.7).clamp(0.0, 1.0);
        }

        LocalFilter::Noir => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            let adjusted = ((luminance - 0.5) * 2.0 + 0.5).clamp(0.0, 1.0);
            *r = adjusted;
            *g = adjusted;
            *b = adjusted;
        }

        LocalFilter::Vivid => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            for c in [&mut *r, &mut *g, &mut *b] {
                let saturated = (luminance + (*c - luminance) * 1.4).clamp(0.0, 1.0);
                *c = ((saturated - 0.5) * 1.15 + 0.5).clamp(0.0, 1.0);
            }
        }

        LocalFilter::Cool => {
            *r = (*r * 0.9).clamp(0.0, 1.0);
            *g = (*g * 0.95).clamp(0.0, 1.0);
            *b = (*b * 1.1).clamp(0.0, 1.0);
        }

        LocalFilter::Warm => {
            *r = (*r * 1.1).clamp(0.0, 1.0);
            *b = (*b * 0.85).clamp(0.0, 1.0);
        }

        LocalFilter::Fade => {
            for c in [&mut *r, &mut *g, &mut *b] {
                *c = (*c * 0.85 + 0.1).clamp(0.0, 1.0);
            }
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            for c in [&mut *r, &mut *g, &mut *b] {
                *c = (luminance + (*c - luminance) * 0.7).clamp(0.0, 1.0);
            }
        }

        LocalFilter::Duotone => {
            let luminance = 0.299 * *r + 0.587 * *g + 0.114 * *b;
            let dark = (0.1, 0.1, 0.4);
            let light = (1.0, 0.9, 0.5);
            *r = dark.0 + luminance * (light.0 - dark.0);
            *g = dark.1 + luminance * (light.1 - dark.1);
            *b = dark.2 + luminance * (light.2 - dark.2);
        }

        LocalFilter::Vignette => {
            let dx = x as f32 / width as f32 - 0.5;
            let dy = y as f32 / height as f32 - 0.5;
            let dist = (dx * dx + dy * dy).sqrt();
            let vignette = 1.0 - smoothstep(0.3, 0.9, dist);
            *r *= vignette;
            *g *= vignette;
            *b *= vignette;
        }

        LocalFilter::Negative => {
            *r = 1.0 - *r;
            *g = 1.0 - *g;
            *b = 1.0 - *b;
        }

        LocalFilter::Posterize => {
            let levels = 4.0;
            *r = (*r * levels).floor() / levels;
            *g = (*g * levels).floor() / levels;
            *b = (*b * levels).floor() / levels;
        }

        LocalFilter::Solarize => {
            for c in [&mut *r, &mut *g, &mut *b] {
                if *c > 0.5 {
                    *c = 1.0 - *c;
                }
            }
        }
    }
}

/// Smoothstep function for vignette
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
