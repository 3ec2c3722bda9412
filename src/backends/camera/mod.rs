// SPDX-License-Identifier: MPL-2.0
// Camera backend with trait-based abstraction

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  DeviceMediaSource  │  ← Lifecycle, mirror flag, facing mode
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  ConstraintLadder   │  ← Ideal → facing only → unconstrained, aspect retry
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← open(constraints) → VideoTrack
//! └─────────────────────┘
//!     │             │
//!     ▼             ▼
//!   V4L2 +       Virtual
//!   GStreamer    (still image)
//! ```

pub mod manager;
pub mod negotiation;
pub mod types;
pub mod v4l2;

pub use manager::DeviceMediaSource;
pub use negotiation::{ConstraintLadder, NegotiatedStream};
pub use types::*;
pub use v4l2::V4l2Backend;

use futures::future::BoxFuture;

/// A source of live video tracks
///
/// Opening a track acquires the device exclusively until the track is
/// stopped or dropped.
pub trait CameraBackend: Send + Sync {
    /// Open a track honoring `constraints` as closely as the device can
    ///
    /// # Returns
    /// * `Ok(track)` - Track opened; its dimensions may still be 0x0
    /// * `Err(BackendError::PermissionDenied)` - Access refused
    /// * `Err(BackendError::DeviceNotFound)` - No device with that facing mode
    fn open<'a>(
        &'a self,
        constraints: &'a CameraConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn VideoTrack>>>;

    /// Human readable backend name for logs
    fn name(&self) -> &str;

    /// Check if this backend can serve any device at all
    fn is_available(&self) -> bool;
}

/// A live stream from one device
pub trait VideoTrack: Send + Sync {
    /// Delivered frame size; (0, 0) until stream metadata is available
    fn dimensions(&self) -> (u32, u32);

    /// Facing mode of the device backing this track
    fn facing(&self) -> Option<FacingMode>;

    /// Copy out the most recent frame
    fn grab_frame(&self) -> BackendResult<CameraFrame>;

    /// Release the device. Stopping twice is a no-op.
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}
