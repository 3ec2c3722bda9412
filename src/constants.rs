// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Preferred capture aspect ratio
///
/// The booth asks the camera for this shape first; devices that cannot honor it
/// get one retry at a device-safe resolution before their native shape is
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 4:3, the native shape of most webcam sensors (default)
    #[default]
    FourThree,
    /// 16:9 widescreen
    SixteenNine,
    /// 1:1 square
    Square,
    /// 3:4 portrait (phones held upright)
    ThreeFour,
}

impl AspectRatio {
    /// Get all variants for UI iteration
    pub const ALL: [AspectRatio; 4] = [
        AspectRatio::FourThree,
        AspectRatio::SixteenNine,
        AspectRatio::Square,
        AspectRatio::ThreeFour,
    ];

    /// Get display name for the ratio
    pub fn display_name(&self) -> &'static str {
        match self {
            AspectRatio::FourThree => "4:3",
            AspectRatio::SixteenNine => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::ThreeFour => "3:4",
        }
    }

    /// Width divided by height
    pub fn ratio(&self) -> f64 {
        match self {
            AspectRatio::FourThree => 4.0 / 3.0,
            AspectRatio::SixteenNine => 16.0 / 9.0,
            AspectRatio::Square => 1.0,
            AspectRatio::ThreeFour => 3.0 / 4.0,
        }
    }

    /// Resolution with the given long edge in this shape
    ///
    /// Results are rounded to even numbers, which every camera driver accepts.
    pub fn resolution_for_long_edge(&self, long_edge: u32) -> (u32, u32) {
        let ratio = self.ratio();
        let (w, h) = if ratio >= 1.0 {
            (long_edge as f64, long_edge as f64 / ratio)
        } else {
            (long_edge as f64 * ratio, long_edge as f64)
        };
        (round_even(w), round_even(h))
    }
}

fn round_even(value: f64) -> u32 {
    let v = value.round() as u32;
    (v + 1) & !1
}

/// Camera acquisition constants
pub mod camera {
    use super::Duration;

    /// Default long edge requested from the camera (1280x960 at 4:3)
    pub const DEFAULT_LONG_EDGE: u32 = 1280;

    /// Long edge used for the single aspect-ratio retry
    pub const SAFE_LONG_EDGE: u32 = 640;

    /// Maximum absolute difference between requested and delivered ratio
    pub const ASPECT_TOLERANCE: f64 = 0.1;

    /// How long a stream may take to report non-zero dimensions
    pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Poll interval while waiting for stream metadata
    pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Sizes offered for drivers that report a continuous size range
    pub const STEPWISE_MODES: [(u32, u32); 5] =
        [(1920, 1080), (1280, 960), (1280, 720), (640, 480), (320, 240)];

    /// Sizes assumed for a device whose formats could not be queried
    pub const FALLBACK_MODES: [(u32, u32); 2] = [(1280, 720), (640, 480)];

    /// How long GStreamer may take to tear a camera pipeline down
    pub const PIPELINE_STOP_TIMEOUT_SECS: u64 = 2;
}

/// AI transform constants
pub mod transform {
    use super::Duration;

    /// Long-edge cap for the outgoing payload
    pub const MAX_DIMENSION: u32 = 1024;

    /// JPEG quality of the outgoing payload
    pub const JPEG_QUALITY: u8 = 85;

    /// Round trip timeout
    pub const TIMEOUT: Duration = Duration::from_secs(30);
}

/// Caption text layout, relative to the surface height
pub mod caption {
    /// Caption glyph height as a fraction of the surface height
    pub const CAPTION_SCALE: f32 = 0.045;

    /// Watermark glyph height as a fraction of the surface height
    pub const WATERMARK_SCALE: f32 = 0.022;

    /// Caption baseline distance from the bottom edge
    pub const CAPTION_BOTTOM_MARGIN: f32 = 0.074;

    /// Watermark distance from the right and bottom edges
    pub const WATERMARK_MARGIN: f32 = 0.037;

    /// Caption and watermark color (booth accent cyan)
    pub const TEXT_COLOR: [u8; 4] = [0x00, 0xD9, 0xFF, 0xFF];

    /// Caption used when the settings row has none
    pub const DEFAULT_CAPTION: &str = "I HAVE PARTICIPATED";
}

/// Publishing constants
pub mod publish {
    /// File name prefix for uploaded photos
    pub const DEFAULT_PREFIX: &str = "photobooth";

    /// File name prefix for uploaded templates
    pub const TEMPLATE_PREFIX: &str = "template";

    /// MIME type of composed photos
    pub const CONTENT_TYPE: &str = "image/png";

    /// Cache lifetime sent with uploads
    pub const CACHE_CONTROL_SECS: u32 = 3600;
}

/// Settings defaults (mirrors the settings row defaults)
pub mod settings {
    use super::Duration;

    /// Slideshow slide duration in seconds
    pub const SLIDESHOW_DURATION_SECS: u32 = 5;

    /// How often the REST backend polls for changes
    pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Broadcast channel depth for change notifications
    pub const CHANGE_CHANNEL_CAPACITY: usize = 32;
}

/// Supported file formats
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
