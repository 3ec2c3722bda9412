// SPDX-License-Identifier: GPL-3.0-only

//! Constraint negotiation
//!
//! Devices disagree wildly about what they can deliver. Acquisition walks a
//! ladder of progressively looser constraint sets and accepts the first one
//! that produces a stream with real dimensions. If the accepted stream's
//! aspect ratio is far from the requested one, exactly one retry is made at a
//! device-safe resolution; when that retry fails the previously working
//! constraints are reopened.
//!
//! Only one track is ever held at a time: every failed or rejected track is
//! stopped before the next attempt opens the device again.

use super::types::*;
use super::{CameraBackend, VideoTrack};
use crate::constants::{self, AspectRatio};
use crate::errors::CameraFailure;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Ordered constraint sets for one acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintLadder {
    /// Attempts in order, most specific first
    pub steps: Vec<CameraConstraints>,
    /// Width / height the booth asked for
    pub requested_ratio: f64,
    /// Constraints of the single aspect-ratio retry
    pub aspect_retry: CameraConstraints,
    /// Accepted difference between requested and delivered ratio
    pub tolerance: f64,
}

impl ConstraintLadder {
    /// Standard ladder: ideal → facing only → unconstrained
    pub fn new(facing: FacingMode, aspect: AspectRatio, long_edge: u32, safe_long_edge: u32) -> Self {
        let ratio = aspect.ratio();
        let (w, h) = aspect.resolution_for_long_edge(long_edge);
        let (safe_w, safe_h) = aspect.resolution_for_long_edge(safe_long_edge);

        Self {
            steps: vec![
                CameraConstraints::ideal(facing, w, h, ratio),
                CameraConstraints::facing_only(facing),
                CameraConstraints::unconstrained(),
            ],
            requested_ratio: ratio,
            aspect_retry: CameraConstraints::ideal(facing, safe_w, safe_h, ratio),
            tolerance: constants::camera::ASPECT_TOLERANCE,
        }
    }

    /// Whether a delivered frame size is close enough to the requested shape
    pub fn accepts_aspect(&self, width: u32, height: u32) -> bool {
        if height == 0 {
            return false;
        }
        let delivered = width as f64 / height as f64;
        (delivered - self.requested_ratio).abs() <= self.tolerance
    }
}

/// Outcome of a successful negotiation
pub struct NegotiatedStream {
    pub track: Box<dyn VideoTrack>,
    pub width: u32,
    pub height: u32,
    /// Constraint set the track was opened with
    pub constraints: CameraConstraints,
}

impl std::fmt::Debug for NegotiatedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiatedStream")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("constraints", &self.constraints)
            .finish()
    }
}

/// Walk the ladder until a stream with real dimensions is obtained
pub async fn negotiate(
    backend: &dyn CameraBackend,
    ladder: &ConstraintLadder,
    ready_timeout: Duration,
) -> Result<NegotiatedStream, CameraFailure> {
    let mut last_failure = CameraFailure::NoDevice;

    for (attempt, constraints) in ladder.steps.iter().enumerate() {
        debug!(attempt, constraints = %constraints, "Opening camera");

        match open_ready(backend, constraints, ready_timeout).await {
            Ok(stream) => {
                if ladder.accepts_aspect(stream.width, stream.height) {
                    info!(
                        width = stream.width,
                        height = stream.height,
                        constraints = %constraints,
                        "Camera stream ready"
                    );
                    return Ok(stream);
                }
                return retry_for_aspect(backend, ladder, stream, ready_timeout).await;
            }
            Err(CameraFailure::PermissionDenied) => {
                // Looser constraints cannot change the user's answer
                warn!("Camera permission denied");
                return Err(CameraFailure::PermissionDenied);
            }
            Err(e) => {
                warn!(attempt, constraints = %constraints, error = %e, "Camera attempt failed");
                last_failure = e;
            }
        }
    }

    Err(last_failure)
}

/// One retry at the safe resolution, falling back to the stream that already worked
async fn retry_for_aspect(
    backend: &dyn CameraBackend,
    ladder: &ConstraintLadder,
    mut stream: NegotiatedStream,
    ready_timeout: Duration,
) -> Result<NegotiatedStream, CameraFailure> {
    info!(
        width = stream.width,
        height = stream.height,
        requested = ladder.requested_ratio,
        "Aspect ratio off target, retrying at safe resolution"
    );

    let working = stream.constraints.clone();
    stream.track.stop();
    drop(stream);

    match open_ready(backend, &ladder.aspect_retry, ready_timeout).await {
        Ok(retry) => {
            info!(
                width = retry.width,
                height = retry.height,
                "Camera stream ready after aspect retry"
            );
            Ok(retry)
        }
        Err(e) => {
            warn!(error = %e, "Aspect retry failed, reopening previous constraints");
            open_ready(backend, &working, ready_timeout).await
        }
    }
}

/// Open a track and wait for it to report non-zero dimensions
async fn open_ready(
    backend: &dyn CameraBackend,
    constraints: &CameraConstraints,
    ready_timeout: Duration,
) -> Result<NegotiatedStream, CameraFailure> {
    let mut track = backend.open(constraints).await.map_err(failure_from_backend)?;

    match wait_for_dimensions(track.as_ref(), ready_timeout).await {
        Some((width, height)) => Ok(NegotiatedStream {
            track,
            width,
            height,
            constraints: constraints.clone(),
        }),
        None => {
            track.stop();
            Err(CameraFailure::Timeout(ready_timeout))
        }
    }
}

async fn wait_for_dimensions(track: &dyn VideoTrack, ready_timeout: Duration) -> Option<(u32, u32)> {
    let deadline = Instant::now() + ready_timeout;
    loop {
        let (w, h) = track.dimensions();
        if w > 0 && h > 0 {
            return Some((w, h));
        }
        if !track.is_live() || Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(constants::camera::READY_POLL_INTERVAL).await;
    }
}

fn failure_from_backend(err: BackendError) -> CameraFailure {
    match err {
        BackendError::PermissionDenied => CameraFailure::PermissionDenied,
        BackendError::DeviceNotFound(_) => CameraFailure::NoDevice,
        other => CameraFailure::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::{VirtualCameraBackend, VirtualDevice, test_pattern};

    #[test]
    fn test_ladder_order() {
        let ladder = ConstraintLadder::new(FacingMode::User, AspectRatio::FourThree, 1280, 640);
        assert_eq!(ladder.steps.len(), 3);
        assert_eq!(ladder.steps[0].ideal_width, Some(1280));
        assert_eq!(ladder.steps[0].ideal_height, Some(960));
        assert_eq!(ladder.steps[1], CameraConstraints::facing_only(FacingMode::User));
        assert_eq!(ladder.steps[2], CameraConstraints::unconstrained());
        assert_eq!(ladder.aspect_retry.ideal_width, Some(640));
        assert_eq!(ladder.aspect_retry.ideal_height, Some(480));
    }

    #[test]
    fn test_aspect_tolerance() {
        let ladder = ConstraintLadder::new(FacingMode::User, AspectRatio::FourThree, 1280, 640);
        assert!(ladder.accepts_aspect(1280, 960));
        assert!(ladder.accepts_aspect(1280, 1024)); // 1.25
        assert!(!ladder.accepts_aspect(1280, 720)); // 1.78
        assert!(!ladder.accepts_aspect(1280, 0));
    }

    fn ladder() -> ConstraintLadder {
        ConstraintLadder::new(FacingMode::User, AspectRatio::FourThree, 1280, 640)
    }

    fn front_camera(modes: &[(u32, u32)]) -> VirtualCameraBackend {
        VirtualCameraBackend::new(test_pattern(64, 48))
            .with_devices(vec![VirtualDevice::new(FacingMode::User, modes)])
    }

    #[tokio::test]
    async fn test_never_ready_times_out() {
        let backend = VirtualCameraBackend::new(test_pattern(64, 48)).never_ready();
        let timeout = Duration::from_millis(60);

        let err = negotiate(&backend, &ladder(), timeout).await.unwrap_err();

        assert_eq!(err, CameraFailure::Timeout(timeout));
        assert_eq!(backend.open_count(), 3);
        assert_eq!(backend.live_tracks(), 0);
        assert_eq!(backend.peak_live_tracks(), 1);
    }

    #[tokio::test]
    async fn test_rejected_ideal_falls_back_to_facing_only() {
        let backend = VirtualCameraBackend::new(test_pattern(64, 48)).rejecting_width(1280);
        let ladder = ladder();

        let stream = negotiate(&backend, &ladder, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(stream.constraints, ladder.steps[1]);
        assert_eq!((stream.width, stream.height), (1280, 960));
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test]
    async fn test_aspect_mismatch_retries_once_at_safe_size() {
        let backend = front_camera(&[(1280, 720), (640, 480)]);
        let ladder = ladder();

        let stream = negotiate(&backend, &ladder, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!((stream.width, stream.height), (640, 480));
        assert_eq!(stream.constraints, ladder.aspect_retry);
        assert_eq!(backend.open_count(), 2);
        assert_eq!(backend.live_tracks(), 1);
        assert_eq!(backend.peak_live_tracks(), 1);
    }

    #[tokio::test]
    async fn test_failed_aspect_retry_reopens_working_constraints() {
        let backend = front_camera(&[(1280, 720)]).rejecting_width(640);
        let ladder = ladder();

        let stream = negotiate(&backend, &ladder, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!((stream.width, stream.height), (1280, 720));
        assert_eq!(stream.constraints, ladder.steps[0]);
        assert_eq!(backend.open_count(), 2);
        assert_eq!(backend.live_tracks(), 1);
        assert_eq!(backend.peak_live_tracks(), 1);
    }

    #[tokio::test]
    async fn test_slow_metadata_accepted_within_timeout() {
        let backend = VirtualCameraBackend::new(test_pattern(64, 48))
            .with_metadata_delay(Duration::from_millis(150));

        let started = Instant::now();
        let stream = negotiate(&backend, &ladder(), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!((stream.width, stream.height), (1280, 960));
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_stops_the_ladder() {
        let backend = VirtualCameraBackend::new(test_pattern(64, 48));
        backend.set_permission(false);

        let err = negotiate(&backend, &ladder(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(err, CameraFailure::PermissionDenied);
        assert_eq!(backend.open_count(), 0);
    }
}
