// SPDX-License-Identifier: GPL-3.0-only

//! Reusable drawing surface
//!
//! The pixel buffer is kept between compositions and only reallocated when
//! the frame size changes. Every composition starts from a fully cleared
//! buffer at the source's native size.

use image::RgbaImage;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DrawingSurface {
    buffer: Option<RgbaImage>,
}

impl DrawingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the buffer out, cleared and sized to `width` x `height`
    ///
    /// The surface is empty until [`restore`](Self::restore) hands it back, so
    /// a composition that fails midway can never leak partial pixels into the
    /// next one.
    pub fn take_prepared(&mut self, width: u32, height: u32) -> RgbaImage {
        match self.buffer.take() {
            Some(mut buffer) if buffer.dimensions() == (width, height) => {
                buffer.fill(0);
                buffer
            }
            _ => {
                debug!(width, height, "Allocating drawing surface");
                RgbaImage::new(width, height)
            }
        }
    }

    /// Return a buffer for reuse by the next composition
    pub fn restore(&mut self, buffer: RgbaImage) {
        self.buffer = Some(buffer);
    }

    /// Size of the retained buffer, if any
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.buffer.as_ref().map(|b| b.dimensions())
    }
}
