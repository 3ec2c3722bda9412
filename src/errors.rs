// SPDX-License-Identifier: MPL-2.0

//! Error types for the photo booth
//!
//! The taxonomy follows what the user sees: camera acquisition, template
//! overlay, AI filter, publishing and "not ready" rejections each get their own
//! variant so the session can decide whether to degrade or to surface.

use crate::app::state::AiStyle;
use std::fmt;
use std::time::Duration;

/// Result type alias using BoothError
pub type BoothResult<T> = Result<T, BoothError>;

/// Main error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum BoothError {
    /// Permission denied, no device, or no valid frame size in time
    #[error("camera unavailable: {0}")]
    CameraUnavailable(CameraFailure),
    /// Overlay fetch or decode failed
    #[error(transparent)]
    TemplateLoad(#[from] TemplateLoadError),
    /// AI filter round trip failed
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// Upload or record insert failed
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    /// Capture rejected without side effects
    #[error("capture not ready: {0}")]
    CaptureNotReady(NotReadyReason),
    /// Operation not offered in the current session state
    #[error("{action} is not available while {state}")]
    NotAllowed {
        action: &'static str,
        state: crate::app::state::SessionState,
    },
    /// User-supplied image could not be decoded or has no pixels
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
    /// Storage/filesystem errors
    #[error("storage error: {0}")]
    Storage(String),
    /// Remote collaborator errors outside of publishing
    #[error("backend error: {0}")]
    Backend(String),
}

/// Why the camera could not be acquired
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraFailure {
    /// The user (or platform) refused access
    #[error("camera permission denied")]
    PermissionDenied,
    /// No device matched any constraint set
    #[error("no camera device found")]
    NoDevice,
    /// The stream never reported non-zero dimensions
    #[error("camera did not become ready within {0:?}")]
    Timeout(Duration),
    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// Overlay image could not be fetched or decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("template overlay {url} could not be loaded: {reason}")]
pub struct TemplateLoadError {
    pub url: String,
    pub reason: String,
}

/// What went wrong during an AI transform round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformFailure {
    /// Connection refused, DNS, TLS, reset...
    Network(String),
    /// Endpoint answered with a non-2xx status
    Status(u16),
    /// 2xx response without the expected image field
    MissingField(String),
    /// Payload was not a decodable image data URL
    Decode(String),
    /// Frame could not be prepared for sending
    Encode(String),
    /// No response within the configured timeout
    Timeout(Duration),
}

impl fmt::Display for TransformFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformFailure::Network(msg) => write!(f, "network error: {}", msg),
            TransformFailure::Status(code) => write!(f, "endpoint returned HTTP {}", code),
            TransformFailure::MissingField(field) => {
                write!(f, "response is missing the '{}' field", field)
            }
            TransformFailure::Decode(msg) => write!(f, "could not decode result: {}", msg),
            TransformFailure::Encode(msg) => write!(f, "could not encode frame: {}", msg),
            TransformFailure::Timeout(after) => write!(f, "timed out after {:?}", after),
        }
    }
}

/// AI transform failure, tagged with the filter the user picked
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{style} filter failed: {kind}")]
pub struct TransformError {
    pub style: AiStyle,
    pub kind: TransformFailure,
}

impl TransformError {
    pub fn new(style: AiStyle, kind: TransformFailure) -> Self {
        Self { style, kind }
    }
}

/// Persisting a composed photo failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// PNG blob could not be produced
    #[error("could not encode photo: {0}")]
    Encode(String),
    /// Asset store rejected the upload
    #[error("upload of {name} failed: {reason}")]
    Upload { name: String, reason: String },
    /// Asset store could not produce a public URL
    #[error("no public URL for {name}: {reason}")]
    PublicUrl { name: String, reason: String },
    /// Photo row could not be inserted
    #[error("could not record {url}: {reason}")]
    Record { url: String, reason: String },
}

/// Why a capture request was turned into a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// Camera is off
    CameraOff,
    /// Stream has not reported a frame size yet
    ZeroDimensions,
    /// A previous capture is still waiting on the AI filter
    TransformPending,
    /// A photo is already being reviewed
    Reviewing,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::CameraOff => write!(f, "camera is off"),
            NotReadyReason::ZeroDimensions => write!(f, "camera has no frame yet"),
            NotReadyReason::TransformPending => write!(f, "previous capture still processing"),
            NotReadyReason::Reviewing => write!(f, "a photo is already being reviewed"),
        }
    }
}

impl BoothError {
    /// True for the conditions that must disable capture controls
    pub fn is_camera_unavailable(&self) -> bool {
        matches!(self, BoothError::CameraUnavailable(_))
    }
}

impl From<CameraFailure> for BoothError {
    fn from(err: CameraFailure) -> Self {
        BoothError::CameraUnavailable(err)
    }
}

impl From<std::io::Error> for BoothError {
    fn from(err: std::io::Error) -> Self {
        BoothError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for BoothError {
    fn from(err: image::ImageError) -> Self {
        BoothError::InvalidImage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_error_names_the_filter() {
        let err = TransformError::new(AiStyle::Stylize, TransformFailure::Status(502));
        let msg = err.to_string();
        assert!(msg.contains("stylize"), "got {msg}");
        assert!(msg.contains("502"));
    }

    #[test]
    fn camera_failure_converts_to_unavailable() {
        let err: BoothError = CameraFailure::PermissionDenied.into();
        assert!(err.is_camera_unavailable());
        assert!(!BoothError::Storage("x".into()).is_camera_unavailable());
    }
}
