// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device discovery
//!
//! Scans `/dev/video*` for capture nodes and lists the frame sizes each one
//! offers. Kernel video nodes carry no facing information, so facing modes
//! come from configuration or, failing that, from enumeration order.

use crate::backends::camera::types::FacingMode;
use crate::constants;
use std::io;
use tracing::{debug, info, warn};
use v4l::capability::Flags;
use v4l::framesize::FrameSizeEnum;
use v4l::prelude::*;
use v4l::video::Capture;

/// A capture node found on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNode {
    pub path: String,
    pub card: String,
    /// Frame sizes, largest first
    pub modes: Vec<(u32, u32)>,
}

/// A capture node with the facing mode it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareDevice {
    pub path: String,
    pub card: String,
    pub facing: FacingMode,
    pub modes: Vec<(u32, u32)>,
}

/// Frame size reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRange {
    Discrete(u32, u32),
    Stepwise { min: (u32, u32), max: (u32, u32) },
}

impl From<FrameSizeEnum> for SizeRange {
    fn from(size: FrameSizeEnum) -> Self {
        match size {
            FrameSizeEnum::Discrete(d) => SizeRange::Discrete(d.width, d.height),
            FrameSizeEnum::Stepwise(s) => SizeRange::Stepwise {
                min: (s.min_width, s.min_height),
                max: (s.max_width, s.max_height),
            },
        }
    }
}

/// Distinct sizes, largest area first
pub fn modes_from_sizes(sizes: impl IntoIterator<Item = SizeRange>) -> Vec<(u32, u32)> {
    let mut modes = Vec::new();
    for size in sizes {
        match size {
            SizeRange::Discrete(w, h) if w > 0 && h > 0 => modes.push((w, h)),
            SizeRange::Discrete(..) => {}
            SizeRange::Stepwise { min, max } => {
                modes.extend(constants::camera::STEPWISE_MODES.iter().copied().filter(
                    |&(w, h)| (min.0..=max.0).contains(&w) && (min.1..=max.1).contains(&h),
                ));
            }
        }
    }
    modes.sort_by(|a, b| (b.0 * b.1).cmp(&(a.0 * a.1)).then(b.0.cmp(&a.0)));
    modes.dedup();
    modes
}

/// Capture nodes in `/dev`, ordered by node number
pub fn enumerate_devices() -> Vec<CaptureNode> {
    let mut nodes: Vec<(u32, String)> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let index = name.strip_prefix("video")?.parse::<u32>().ok()?;
            Some((index, format!("/dev/{}", name)))
        })
        .collect();
    nodes.sort();

    let devices: Vec<CaptureNode> = nodes
        .into_iter()
        .filter_map(|(_, path)| query_device(&path))
        .collect();
    info!(count = devices.len(), "Enumerated V4L2 capture devices");
    devices
}

fn query_device(path: &str) -> Option<CaptureNode> {
    let device = match Device::with_path(path) {
        Ok(device) => device,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            // Keep it so that opening reports the permission problem
            warn!(path, "No permission to query camera");
            return Some(CaptureNode {
                path: path.to_string(),
                card: String::new(),
                modes: constants::camera::FALLBACK_MODES.to_vec(),
            });
        }
        Err(e) => {
            debug!(path, error = %e, "Skipping video node");
            return None;
        }
    };

    let caps = device.query_caps().ok()?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!(path, "Not a capture node");
        return None;
    }

    let mut sizes = Vec::new();
    for format in device.enum_formats().ok()? {
        if let Ok(frame_sizes) = device.enum_framesizes(format.fourcc) {
            sizes.extend(frame_sizes.into_iter().map(|f| SizeRange::from(f.size)));
        }
    }
    let modes = modes_from_sizes(sizes);
    if modes.is_empty() {
        // Metadata nodes of UVC cameras land here
        debug!(path, card = %caps.card, "No video frame sizes");
        return None;
    }

    debug!(path, card = %caps.card, modes = modes.len(), "Found capture device");
    Some(CaptureNode {
        path: path.to_string(),
        card: caps.card,
        modes,
    })
}

/// Decide which device serves which facing mode
///
/// Configured paths win. Facing modes left open are filled from the
/// remaining devices in order, front first. Extra devices are ignored.
pub fn assign_facing(
    nodes: Vec<CaptureNode>,
    user_device: Option<&str>,
    environment_device: Option<&str>,
) -> Vec<HardwareDevice> {
    let mut remaining = nodes;
    let mut slots: Vec<(FacingMode, Option<CaptureNode>)> = Vec::new();

    for (facing, wanted) in [
        (FacingMode::User, user_device),
        (FacingMode::Environment, environment_device),
    ] {
        let pinned = wanted.and_then(|path| {
            let found = remaining.iter().position(|d| d.path == path);
            if found.is_none() {
                warn!(%facing, path, "Configured camera not found");
            }
            found.map(|i| remaining.remove(i))
        });
        slots.push((facing, pinned));
    }

    let mut spare = remaining.into_iter();
    slots
        .into_iter()
        .filter_map(|(facing, device)| {
            let device = device.or_else(|| spare.next())?;
            info!(%facing, path = %device.path, card = %device.card, "Camera assigned");
            Some(HardwareDevice {
                path: device.path,
                card: device.card,
                facing,
                modes: device.modes,
            })
        })
        .collect()
}
