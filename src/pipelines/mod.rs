// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured photos
//!
//! Heavy raster work runs in blocking tasks so the session stays responsive
//! while a photo is being composed or published.
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Source Frame │ ──▶ │  Photo Pipeline   │ ──▶ │ ComposedImage│
//! │ (camera or   │     │  - Mirror/Filter  │     │    (PNG)     │
//! │  upload)     │     │  - AI transform ──┼──▶ transform endpoint
//! │              │     │  - Overlay/Text   │     │              │
//! └──────────────┘     └───────────────────┘     └──────┬───────┘
//!                                                       │
//!                      ┌───────────────────┐            │
//!                      │ Publish Pipeline  │ ◀──────────┘
//!                      │  - Upload         │
//!                      │  - Record         │
//!                      │  - Local copy     │
//!                      └───────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Frame compositor
//! - [`transform`]: AI transform client
//! - [`publish`]: Upload, record and local copy

pub mod photo;
pub mod publish;
pub mod transform;
