// SPDX-License-Identifier: GPL-3.0-only

//! Hardware camera backend
//!
//! Discovers V4L2 capture nodes with the `v4l` crate and streams from them
//! through a GStreamer pipeline. Opening resolves constraints against the
//! frame sizes the driver reported, then starts the pipeline at that size.

mod enumeration;
mod pipeline;

pub use enumeration::{
    CaptureNode, HardwareDevice, SizeRange, assign_facing, enumerate_devices, modes_from_sizes,
};
pub use pipeline::{GstTrack, pack_rows, pipeline_description};

use super::types::{BackendError, BackendResult, CameraConstraints};
use super::{CameraBackend, VideoTrack};
use crate::config::CameraConfig;
use futures::future::BoxFuture;
use std::io;
use tracing::{debug, info};

/// Live cameras attached to this machine
pub struct V4l2Backend {
    devices: Vec<HardwareDevice>,
}

impl V4l2Backend {
    /// Enumerate devices and assign facing modes from `config`
    pub fn discover(config: &CameraConfig) -> Self {
        Self::with_devices(assign_facing(
            enumerate_devices(),
            config.user_device.as_deref(),
            config.environment_device.as_deref(),
        ))
    }

    pub fn with_devices(devices: Vec<HardwareDevice>) -> Self {
        info!(count = devices.len(), "Hardware camera backend ready");
        Self { devices }
    }

    pub fn devices(&self) -> &[HardwareDevice] {
        &self.devices
    }

    /// Device and frame size that best match `constraints`
    pub fn resolve(
        &self,
        constraints: &CameraConstraints,
    ) -> BackendResult<(&HardwareDevice, (u32, u32))> {
        let device = match constraints.facing {
            Some(facing) => self.devices.iter().find(|d| d.facing == facing),
            None => self.devices.first(),
        }
        .ok_or_else(|| {
            BackendError::DeviceNotFound(
                constraints
                    .facing
                    .map(|f| format!("no {} camera", f))
                    .unwrap_or_else(|| "no camera".into()),
            )
        })?;

        let mode = constraints
            .closest_mode(&device.modes)
            .ok_or_else(|| BackendError::DeviceNotFound(format!("{} has no modes", device.path)))?;
        Ok((device, mode))
    }
}

/// Fail early with a permission error instead of a silent pipeline stall
fn check_access(path: &str) -> BackendResult<()> {
    match std::fs::OpenOptions::new().read(true).write(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(BackendError::PermissionDenied),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BackendError::DeviceNotFound(path.to_string()))
        }
        Err(e) => Err(BackendError::IoError(e.to_string())),
    }
}

impl CameraBackend for V4l2Backend {
    fn open<'a>(
        &'a self,
        constraints: &'a CameraConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn VideoTrack>>> {
        Box::pin(async move {
            let (device, (width, height)) = self.resolve(constraints)?;
            check_access(&device.path)?;
            debug!(path = %device.path, width, height, constraints = %constraints, "Opening camera");

            let path = device.path.clone();
            let facing = device.facing;
            let track = tokio::task::spawn_blocking(move || {
                GstTrack::launch(&path, width, height, facing)
            })
            .await
            .map_err(|e| BackendError::Other(format!("camera task failed: {}", e)))??;
            Ok(Box::new(track) as Box<dyn VideoTrack>)
        })
    }

    fn name(&self) -> &str {
        "v4l2"
    }

    fn is_available(&self) -> bool {
        !self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FacingMode;

    fn backend() -> V4l2Backend {
        V4l2Backend::with_devices(vec![
            HardwareDevice {
                path: "/dev/video0".into(),
                card: "Front".into(),
                facing: FacingMode::User,
                modes: vec![(1280, 720), (640, 480)],
            },
            HardwareDevice {
                path: "/dev/video2".into(),
                card: "Rear".into(),
                facing: FacingMode::Environment,
                modes: vec![(1920, 1080), (1280, 960)],
            },
        ])
    }

    #[test]
    fn test_resolve_by_facing_and_ideal_size() {
        let backend = backend();
        let c = CameraConstraints::ideal(FacingMode::Environment, 1280, 960, 4.0 / 3.0);
        let (device, mode) = backend.resolve(&c).unwrap();
        assert_eq!(device.path, "/dev/video2");
        assert_eq!(mode, (1280, 960));
    }

    #[test]
    fn test_unconstrained_takes_first_native_mode() {
        let backend = backend();
        let (device, mode) = backend.resolve(&CameraConstraints::unconstrained()).unwrap();
        assert_eq!(device.path, "/dev/video0");
        assert_eq!(mode, (1280, 720));
    }

    #[tokio::test]
    async fn test_missing_facing_is_not_found() {
        let backend = V4l2Backend::with_devices(Vec::new());
        assert!(!backend.is_available());
        let result = backend
            .open(&CameraConstraints::facing_only(FacingMode::User))
            .await;
        assert!(matches!(result, Err(BackendError::DeviceNotFound(_))));
    }

    #[test]
    fn test_missing_node_is_not_found() {
        assert!(matches!(
            check_access("/dev/photobooth-no-such-camera"),
            Err(BackendError::DeviceNotFound(_))
        ));
    }
}
