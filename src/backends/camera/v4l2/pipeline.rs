// SPDX-License-Identifier: MPL-2.0

//! GStreamer capture pipeline for one V4L2 device
//!
//! ```text
//! v4l2src → decodebin → videoconvert → videoscale → RGBA caps → appsink
//! ```
//!
//! The appsink keeps only the newest frame. The track reports 0x0 until the
//! first frame has arrived.

use crate::backends::camera::VideoTrack;
use crate::backends::camera::types::{BackendError, BackendResult, CameraFrame, FacingMode};
use crate::constants;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// gst-launch description for a device at a fixed output size
pub fn pipeline_description(device: &str, width: u32, height: u32) -> String {
    format!(
        "v4l2src device=\"{}\" ! decodebin ! videoconvert ! videoscale ! \
         video/x-raw,format=RGBA,width={},height={} ! \
         appsink name=sink max-buffers=1 drop=true sync=false",
        device, width, height
    )
}

/// Copy `height` rows of `width` RGBA pixels out of a padded buffer
pub fn pack_rows(src: &[u8], width: u32, height: u32, stride: usize) -> BackendResult<Vec<u8>> {
    let row = width as usize * 4;
    if stride < row || src.len() < stride * (height as usize).saturating_sub(1) + row {
        return Err(BackendError::Other(format!(
            "frame buffer too small: {} bytes for {}x{} with stride {}",
            src.len(),
            width,
            height,
            stride
        )));
    }
    if stride == row {
        return Ok(src[..row * height as usize].to_vec());
    }

    let mut packed = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        packed.extend_from_slice(&src[y * stride..y * stride + row]);
    }
    Ok(packed)
}

fn frame_from_sample(sample: &gstreamer::Sample) -> BackendResult<CameraFrame> {
    let caps = sample
        .caps()
        .ok_or_else(|| BackendError::Other("No caps on sample".into()))?;
    let info = VideoInfo::from_caps(caps)
        .map_err(|e| BackendError::Other(format!("Unreadable caps: {}", e)))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| BackendError::Other("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| BackendError::Other("Failed to map buffer".into()))?;

    let stride = info.stride()[0].max(0) as usize;
    let data = pack_rows(map.as_slice(), info.width(), info.height(), stride)?;
    Ok(CameraFrame {
        width: info.width(),
        height: info.height(),
        data: Arc::from(data.into_boxed_slice()),
        captured_at: Instant::now(),
    })
}

/// A running capture pipeline
pub struct GstTrack {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    facing: FacingMode,
    live: bool,
    failed: AtomicBool,
}

impl GstTrack {
    /// Build the pipeline and set it playing. Blocks on GStreamer.
    pub fn launch(device: &str, width: u32, height: u32, facing: FacingMode) -> BackendResult<Self> {
        gstreamer::init().map_err(|e| BackendError::Other(format!("GStreamer init failed: {}", e)))?;

        let description = pipeline_description(device, width, height);
        debug!(pipeline = %description, "Launching camera pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::Other(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| BackendError::Other("Failed to downcast to Pipeline".into()))?;
        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::Other("Failed to find appsink".into()))?
            .downcast::<AppSink>()
            .map_err(|_| BackendError::Other("Failed to downcast to AppSink".into()))?;

        let latest = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&latest);
        appsink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    match frame_from_sample(&sample) {
                        Ok(frame) => {
                            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
                        }
                        Err(e) => warn!(error = %e, "Dropping camera frame"),
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let reason = pop_bus_error(&pipeline).unwrap_or_else(|| e.to_string());
            error!(device, error = %reason, "Camera pipeline failed to start");
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(BackendError::Other(format!(
                "failed to start camera {}: {}",
                device, reason
            )));
        }

        info!(device, width, height, %facing, "Camera pipeline playing");
        Ok(Self {
            pipeline,
            appsink,
            latest,
            facing,
            live: true,
            failed: AtomicBool::new(false),
        })
    }

    /// Whether the pipeline posted an error since it started
    fn has_failed(&self) -> bool {
        if self.failed.load(Ordering::SeqCst) {
            return true;
        }
        match pop_bus_error(&self.pipeline) {
            Some(reason) => {
                error!(error = %reason, "Camera pipeline error");
                self.failed.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    fn latest(&self) -> Option<CameraFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn pop_bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
    match msg.view() {
        gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
    }
}

impl VideoTrack for GstTrack {
    fn dimensions(&self) -> (u32, u32) {
        if !self.is_live() {
            return (0, 0);
        }
        self.latest()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    fn facing(&self) -> Option<FacingMode> {
        Some(self.facing)
    }

    fn grab_frame(&self) -> BackendResult<CameraFrame> {
        if !self.live {
            return Err(BackendError::Stopped);
        }
        self.latest().ok_or(BackendError::NotReady)
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.appsink.set_callbacks(AppSinkCallbacks::builder().build());
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop camera pipeline");
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            constants::camera::PIPELINE_STOP_TIMEOUT_SECS,
        ));
        debug!(result = ?result, state = ?state, "Camera pipeline stopped");
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn is_live(&self) -> bool {
        self.live && !self.has_failed()
    }
}

impl Drop for GstTrack {
    fn drop(&mut self) {
        self.stop();
    }
}
