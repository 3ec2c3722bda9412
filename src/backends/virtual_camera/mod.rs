// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! Serves frames scaled from a still image through the same [`CameraBackend`]
//! interface a hardware device would use. Each virtual device has a facing
//! mode and a list of supported modes; opening picks the mode closest to the
//! requested constraints, the way browsers resolve "ideal" constraints.
//!
//! The backend can also simulate the awkward parts of real hardware: refused
//! permission, slow stream metadata, streams that never become ready and
//! drivers that reject particular resolutions.

mod file_source;

pub use file_source::{decode_frame, load_image_as_frame, test_pattern};

use crate::backends::camera::types::{
    BackendError, BackendResult, CameraConstraints, CameraFrame, FacingMode,
};
use crate::backends::camera::{CameraBackend, VideoTrack};
use futures::future::BoxFuture;
use image::RgbaImage;
use image::imageops::FilterType;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One simulated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDevice {
    pub facing: FacingMode,
    /// Supported frame sizes, native mode first
    pub modes: Vec<(u32, u32)>,
}

impl VirtualDevice {
    pub fn new(facing: FacingMode, modes: &[(u32, u32)]) -> Self {
        Self {
            facing,
            modes: modes.to_vec(),
        }
    }
}

/// Shared counters for observing device usage
#[derive(Debug, Default)]
struct Usage {
    opened: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
}

/// Camera backend backed by a still image
pub struct VirtualCameraBackend {
    source: Arc<RgbaImage>,
    devices: Vec<VirtualDevice>,
    permission_granted: AtomicBool,
    metadata_delay: Duration,
    never_ready: bool,
    rejected_widths: Vec<u32>,
    usage: Arc<Usage>,
}

impl VirtualCameraBackend {
    /// Single front camera with 4:3, 16:9 and VGA modes
    pub fn new(source: RgbaImage) -> Self {
        Self {
            source: Arc::new(source),
            devices: vec![VirtualDevice::new(
                FacingMode::User,
                &[(1280, 960), (1280, 720), (640, 480)],
            )],
            permission_granted: AtomicBool::new(true),
            metadata_delay: Duration::ZERO,
            never_ready: false,
            rejected_widths: Vec::new(),
            usage: Arc::new(Usage::default()),
        }
    }

    /// Replace the simulated devices
    pub fn with_devices(mut self, devices: Vec<VirtualDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Delay before a new track reports its frame size
    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = delay;
        self
    }

    /// Tracks open but never report a frame size
    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    /// Fail `open` when this ideal width is requested
    pub fn rejecting_width(mut self, width: u32) -> Self {
        self.rejected_widths.push(width);
        self
    }

    /// Grant or revoke camera permission
    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    /// Number of successful `open` calls
    pub fn open_count(&self) -> usize {
        self.usage.opened.load(Ordering::SeqCst)
    }

    /// Number of tracks currently live
    pub fn live_tracks(&self) -> usize {
        self.usage.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live tracks seen
    pub fn peak_live_tracks(&self) -> usize {
        self.usage.peak_live.load(Ordering::SeqCst)
    }

    fn open_sync(&self, constraints: &CameraConstraints) -> BackendResult<Box<dyn VideoTrack>> {
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(BackendError::PermissionDenied);
        }

        let device = match constraints.facing {
            Some(facing) => self.devices.iter().find(|d| d.facing == facing),
            None => self.devices.first(),
        }
        .ok_or_else(|| {
            BackendError::DeviceNotFound(format!(
                "no {} camera",
                constraints
                    .facing
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "virtual".into())
            ))
        })?;

        if let Some(width) = constraints.ideal_width
            && self.rejected_widths.contains(&width)
        {
            return Err(BackendError::Other(format!(
                "driver rejected width {}",
                width
            )));
        }

        let (width, height) = constraints
            .closest_mode(&device.modes)
            .ok_or_else(|| BackendError::DeviceNotFound("device has no modes".into()))?;

        let live = self.usage.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.usage.peak_live.fetch_max(live, Ordering::SeqCst);
        self.usage.opened.fetch_add(1, Ordering::SeqCst);

        debug!(width, height, facing = %device.facing, "Opened virtual camera track");

        Ok(Box::new(VirtualTrack {
            width,
            height,
            facing: device.facing,
            source: Arc::clone(&self.source),
            ready_at: (!self.never_ready).then(|| Instant::now() + self.metadata_delay),
            live: true,
            usage: Arc::clone(&self.usage),
            frame: OnceLock::new(),
        }))
    }
}

impl CameraBackend for VirtualCameraBackend {
    fn open<'a>(
        &'a self,
        constraints: &'a CameraConstraints,
    ) -> BoxFuture<'a, BackendResult<Box<dyn VideoTrack>>> {
        Box::pin(async move { self.open_sync(constraints) })
    }

    fn name(&self) -> &str {
        "virtual"
    }

    fn is_available(&self) -> bool {
        !self.devices.is_empty()
    }
}

struct VirtualTrack {
    width: u32,
    height: u32,
    facing: FacingMode,
    source: Arc<RgbaImage>,
    /// None when the track never becomes ready
    ready_at: Option<Instant>,
    live: bool,
    usage: Arc<Usage>,
    frame: OnceLock<CameraFrame>,
}

impl VideoTrack for VirtualTrack {
    fn dimensions(&self) -> (u32, u32) {
        match self.ready_at {
            Some(at) if self.live && Instant::now() >= at => (self.width, self.height),
            _ => (0, 0),
        }
    }

    fn facing(&self) -> Option<FacingMode> {
        Some(self.facing)
    }

    fn grab_frame(&self) -> BackendResult<CameraFrame> {
        if !self.live {
            return Err(BackendError::Stopped);
        }
        if self.dimensions() == (0, 0) {
            return Err(BackendError::NotReady);
        }

        let frame = self.frame.get_or_init(|| {
            let scaled = image::DynamicImage::ImageRgba8((*self.source).clone())
                .resize_to_fill(self.width, self.height, FilterType::Triangle)
                .to_rgba8();
            CameraFrame::from_rgba(scaled)
        });

        let mut frame = frame.clone();
        frame.captured_at = Instant::now();
        Ok(frame)
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.usage.live.fetch_sub(1, Ordering::SeqCst);
            info!(width = self.width, height = self.height, "Virtual camera track stopped");
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for VirtualTrack {
    fn drop(&mut self) {
        self.stop();
    }
}
