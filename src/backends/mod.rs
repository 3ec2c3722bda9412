// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera input and remote collaborators
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  App Layer                   │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Camera    │    │     Remote       │   │
//! │  │  (tracks)   │    │ (local or REST)  │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │  ┌─────────────┐                           │
//! │  │  Virtual    │                           │
//! │  │  Camera     │                           │
//! │  └─────────────┘                           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Track abstraction, constraint negotiation, device media source
//! - [`virtual_camera`]: Still-image camera used by the CLI and tests
//! - [`remote`]: Settings rows, photo rows, asset store and image fetching

pub mod camera;
pub mod remote;
pub mod virtual_camera;
