// SPDX-License-Identifier: MPL-2.0

//! Photobooth - the composition pipeline of an event photo booth
//!
//! This library turns a live camera frame (or an uploaded image) into a
//! finished event photo and publishes it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture session state machine, template resolver, admin actions
//! - [`backends`]: Camera and remote collaborator abstractions
//! - [`pipelines`]: Frame compositor, AI transform client, publish pipeline
//! - [`config`]: Booth configuration handling
//! - [`storage`]: Local copies of published photos
//!
//! # Example
//!
//! ```ignore
//! let context = BoothContext::connect(Config::load(None)?).await?;
//! let mut session = context.session(Arc::new(VirtualCameraBackend::new(image)));
//! session.start_camera().await?;
//! session.capture().await?;
//! let receipt = session.publish().await?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use app::{BoothContext, CaptureSession, FilterSelection, SessionState, TemplateConfig};
pub use config::Config;
pub use errors::{BoothError, BoothResult};
pub use pipelines::photo::{ComposedImage, PhotoPipeline};
