// SPDX-License-Identifier: GPL-3.0-only

//! Device media source
//!
//! Owns at most one live track at a time and remembers the presentation
//! state (mirror flag, facing mode) that applies to captured frames.

use super::negotiation::{self, ConstraintLadder};
use super::types::*;
use super::{CameraBackend, VideoTrack};
use crate::config::CameraConfig;
use crate::errors::CameraFailure;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

struct ActiveStream {
    track: Box<dyn VideoTrack>,
    info: MediaFrameSource,
}

/// Live camera input for the capture session
pub struct DeviceMediaSource {
    backend: Arc<dyn CameraBackend>,
    config: CameraConfig,
    facing: FacingMode,
    mirrored: bool,
    stream: Option<ActiveStream>,
}

impl DeviceMediaSource {
    pub fn new(backend: Arc<dyn CameraBackend>, config: CameraConfig) -> Self {
        info!(backend = backend.name(), "Creating device media source");
        Self {
            facing: config.facing,
            mirrored: config.mirror,
            backend,
            config,
            stream: None,
        }
    }

    /// Acquire the camera, stopping any track currently held
    pub async fn start(&mut self) -> Result<MediaFrameSource, CameraFailure> {
        self.stop();

        let ladder = ConstraintLadder::new(
            self.facing,
            self.config.aspect_ratio,
            self.config.long_edge,
            self.config.safe_long_edge,
        );
        let negotiated =
            negotiation::negotiate(self.backend.as_ref(), &ladder, self.config.ready_timeout())
                .await?;

        let info = MediaFrameSource {
            width: negotiated.width,
            height: negotiated.height,
            mirrored: self.mirrored,
            origin: FrameOrigin::Camera,
            facing: negotiated.track.facing(),
        };
        self.stream = Some(ActiveStream {
            track: negotiated.track,
            info: info.clone(),
        });
        Ok(info)
    }

    /// Release the device. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("Stopping camera track");
            stream.track.stop();
        }
    }

    /// Flip the mirror flag; returns the new value
    pub fn toggle_mirror(&mut self) -> bool {
        self.mirrored = !self.mirrored;
        if let Some(stream) = self.stream.as_mut() {
            stream.info.mirrored = self.mirrored;
        }
        self.mirrored
    }

    /// Restart on the opposite camera
    ///
    /// Fails with [`CameraFailure::NoDevice`] when only a camera facing the
    /// current way could be opened; that stream is kept. On any other
    /// failure the previous facing mode is restored and restarted before the
    /// switch failure is reported.
    pub async fn switch_facing(&mut self) -> Result<MediaFrameSource, CameraFailure> {
        let previous = self.facing;
        let target = previous.toggled();
        self.facing = target;
        info!(from = %previous, to = %target, "Switching camera");

        match self.start().await {
            Ok(info) if info.facing.is_none_or(|f| f == target) => Ok(info),
            Ok(info) => {
                warn!(requested = %target, delivered = ?info.facing, "No camera facing the requested way");
                self.facing = previous;
                Err(CameraFailure::NoDevice)
            }
            Err(e) => {
                self.facing = previous;
                if let Err(reopen) = self.start().await {
                    error!(error = %reopen, "Could not reopen previous camera");
                }
                Err(e)
            }
        }
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn is_active(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.track.is_live())
    }

    /// Description of the running stream, if any
    pub fn current(&self) -> Option<&MediaFrameSource> {
        self.stream.as_ref().map(|s| &s.info)
    }

    /// Frame size of the running stream, only when it is non-zero
    pub fn ready_dimensions(&self) -> Option<(u32, u32)> {
        let stream = self.stream.as_ref()?;
        match stream.track.dimensions() {
            (w, h) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Grab the current frame with the mirror flag it was shown with
    pub fn grab(&self) -> BackendResult<SourceFrame> {
        let stream = self.stream.as_ref().ok_or(BackendError::Stopped)?;
        let frame = stream.track.grab_frame()?;
        if frame.is_empty() {
            return Err(BackendError::NotReady);
        }
        Ok(SourceFrame {
            frame,
            mirrored: self.mirrored,
            origin: FrameOrigin::Camera,
        })
    }
}

impl Drop for DeviceMediaSource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for DeviceMediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMediaSource")
            .field("backend", &self.backend.name())
            .field("facing", &self.facing)
            .field("mirrored", &self.mirrored)
            .field("stream", &self.current())
            .finish()
    }
}
