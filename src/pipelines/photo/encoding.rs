// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! - PNG (lossless) for the composed photo
//! - JPEG (with quality control) for the AI transform payload
//! - `data:` URLs in and out of the transform service

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbImage, RgbaImage};
use tracing::debug;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "image/jpeg",
            EncodingFormat::Png => "image/png",
        }
    }

    /// Encode an RGBA image in this format
    pub fn encode(&self, image: &RgbaImage, jpeg_quality: u8) -> Result<Vec<u8>, String> {
        match self {
            EncodingFormat::Png => encode_png(image),
            EncodingFormat::Jpeg => encode_jpeg(image, jpeg_quality),
        }
    }
}

/// Encode image as PNG, alpha preserved
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();

    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {}", e))?;

    debug!(size = buffer.len(), "PNG encoding complete");
    Ok(buffer)
}

/// Encode image as JPEG
///
/// JPEG has no alpha channel; pixels are composited over black first.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        let a = p[3] as u16;
        image::Rgb([
            (p[0] as u16 * a / 255) as u8,
            (p[1] as u16 * a / 255) as u8,
            (p[2] as u16 * a / 255) as u8,
        ])
    });

    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));

    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| format!("JPEG encoding failed: {}", e))?;

    debug!(size = buffer.len(), quality, "JPEG encoding complete");
    Ok(buffer)
}

/// Decode any supported image into RGBA
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, String> {
    let image = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let rgba = image.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err("image has no pixels".to_string());
    }
    Ok(rgba)
}

/// `data:<mime>;base64,<payload>`
pub fn to_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Split a base64 `data:` URL into its MIME type and decoded bytes
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>), String> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URL".to_string())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URL has no payload".to_string())?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| "data URL is not base64 encoded".to_string())?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64: {}", e))?;
    Ok((mime.to_string(), bytes))
}
