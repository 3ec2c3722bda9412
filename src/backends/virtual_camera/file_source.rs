// SPDX-License-Identifier: GPL-3.0-only

//! Still-image frame sources
//!
//! Frames loaded from disk or from uploaded bytes, plus a generated test
//! pattern for running the booth without a source image.

use crate::backends::camera::types::{BackendError, BackendResult, CameraFrame};
use crate::constants::file_formats;
use image::{Rgba, RgbaImage};
use std::path::Path;
use tracing::{debug, info};

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !file_formats::is_image_extension(&extension) {
        return Err(BackendError::Other(format!(
            "Unsupported file format: {}",
            extension
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    info!(width = rgba.width(), height = rgba.height(), "Image loaded successfully");

    Ok(CameraFrame::from_rgba(rgba))
}

/// Decode an in-memory image (PNG, JPEG, ...) into an RGBA frame
///
/// Rejects images without pixels.
pub fn decode_frame(bytes: &[u8]) -> BackendResult<CameraFrame> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| BackendError::Other(format!("Failed to decode image: {}", e)))?;

    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(BackendError::Other("Image has no pixels".into()));
    }

    debug!(width = rgba.width(), height = rgba.height(), "Decoded image");
    Ok(CameraFrame::from_rgba(rgba))
}

/// Eight vertical color bars with a horizontal luminance ramp at the bottom
pub fn test_pattern(width: u32, height: u32) -> RgbaImage {
    const BARS: [[u8; 3]; 8] = [
        [235, 235, 235],
        [235, 235, 16],
        [16, 235, 235],
        [16, 235, 16],
        [235, 16, 235],
        [235, 16, 16],
        [16, 16, 235],
        [16, 16, 16],
    ];

    let ramp_start = height - height / 6;
    RgbaImage::from_fn(width, height, |x, y| {
        if y >= ramp_start {
            let v = (x as f32 / width.max(1) as f32 * 255.0) as u8;
            Rgba([v, v, v, 255])
        } else {
            let bar = ((x as usize * BARS.len()) / width.max(1) as usize).min(BARS.len() - 1);
            let [r, g, b] = BARS[bar];
            Rgba([r, g, b, 255])
        }
    })
}
