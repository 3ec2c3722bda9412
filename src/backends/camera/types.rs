// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use image::{ImageBuffer, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which way the camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Front camera (selfie)
    #[default]
    User,
    /// Rear camera
    Environment,
}

impl FacingMode {
    /// The opposite camera
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

impl std::str::FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "back" | "rear" => Ok(FacingMode::Environment),
            other => Err(format!("unknown facing mode '{}'", other)),
        }
    }
}

/// One attempt in the constraint ladder
///
/// Every field is a preference ("ideal"), not a requirement: a device that
/// cannot honor a resolution or ratio still opens with its nearest mode. Only
/// the facing mode can make an attempt fail outright.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraConstraints {
    pub facing: Option<FacingMode>,
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
    pub aspect_ratio: Option<f64>,
}

impl CameraConstraints {
    /// No preferences at all, take whatever the device offers
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn facing_only(facing: FacingMode) -> Self {
        Self {
            facing: Some(facing),
            ..Self::default()
        }
    }

    pub fn ideal(facing: FacingMode, width: u32, height: u32, aspect_ratio: f64) -> Self {
        Self {
            facing: Some(facing),
            ideal_width: Some(width),
            ideal_height: Some(height),
            aspect_ratio: Some(aspect_ratio),
        }
    }

    /// Mode with the smallest fitness distance to these constraints
    ///
    /// Ties go to the earlier mode, so with no preferences the first
    /// (native) mode wins.
    pub fn closest_mode(&self, modes: &[(u32, u32)]) -> Option<(u32, u32)> {
        let distance = |&(w, h): &(u32, u32)| -> f64 {
            let mut d = 0.0;
            if let Some(iw) = self.ideal_width.filter(|v| *v > 0) {
                d += (w as f64 - iw as f64).abs() / iw as f64;
            }
            if let Some(ih) = self.ideal_height.filter(|v| *v > 0) {
                d += (h as f64 - ih as f64).abs() / ih as f64;
            }
            if let Some(ratio) = self.aspect_ratio.filter(|r| *r > 0.0) {
                d += (w as f64 / h.max(1) as f64 - ratio).abs() / ratio;
            }
            d
        };

        modes
            .iter()
            .copied()
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
    }
}

impl std::fmt::Display for CameraConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let (Some(w), Some(h)) = (self.ideal_width, self.ideal_height) {
            parts.push(format!("{}x{}", w, h));
        }
        if let Some(ratio) = self.aspect_ratio {
            parts.push(format!("ratio {:.2}", ratio));
        }
        if let Some(facing) = self.facing {
            parts.push(format!("facing {}", facing));
        }
        if parts.is_empty() {
            write!(f, "unconstrained")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Where a frame came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOrigin {
    Camera,
    Upload,
}

/// Description of the active input, as reported to the session
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFrameSource {
    pub width: u32,
    pub height: u32,
    pub mirrored: bool,
    pub origin: FrameOrigin,
    /// Facing mode actually delivered (None for uploads)
    pub facing: Option<FacingMode>,
}

impl MediaFrameSource {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// A single RGBA frame from the camera or from an uploaded file
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels (4 bytes per pixel)
    pub data: Arc<[u8]>,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: Arc::from(image.into_raw().into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    /// Borrow the pixels as an image view (no copy)
    pub fn as_image(&self) -> Option<ImageBuffer<Rgba<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, &self.data[..])
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A frame ready for composition, with the presentation flags it was captured under
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub frame: CameraFrame,
    /// Mirror horizontally when drawing (preview was mirrored)
    pub mirrored: bool,
    pub origin: FrameOrigin,
}

impl SourceFrame {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// User or platform refused camera access
    PermissionDenied,
    /// No device matches the requested facing mode
    DeviceNotFound(String),
    /// Track was stopped
    Stopped,
    /// Track has not reported a frame size yet
    NotReady,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::PermissionDenied => write!(f, "Camera permission denied"),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Stopped => write!(f, "Track stopped"),
            BackendError::NotReady => write!(f, "Track has no frame yet"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraints_display() {
        let c = CameraConstraints::ideal(FacingMode::User, 1280, 960, 4.0 / 3.0);
        assert_eq!(c.to_string(), "1280x960, ratio 1.33, facing user");
        assert_eq!(CameraConstraints::unconstrained().to_string(), "unconstrained");
    }

    #[test]
    fn test_frame_view_matches_dimensions() {
        let frame = CameraFrame::from_rgba(RgbaImage::new(4, 2));
        let view = frame.as_image().unwrap();
        assert_eq!(view.dimensions(), (4, 2));
        assert!(!frame.is_empty());
    }
}
