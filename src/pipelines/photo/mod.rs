// SPDX-License-Identifier: MPL-2.0

//! Frame compositor
//!
//! Turns a source frame, a filter selection and an overlay layer into one
//! PNG at the source's native resolution:
//!
//! ```text
//! Source frame → Draw (mirror + local filter) → AI transform? → Overlay/Captions → PNG
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Prepare**: Clear and size the surface to the source frame
//! 2. **Draw**: Copy the frame, mirrored if the preview was, applying a local filter
//! 3. **Transform**: For AI filters, replace the pixels with the service result
//!    (falls back to the drawn frame on any failure)
//! 4. **Overlay**: Template image on top, or caption + watermark when there is none
//! 5. **Encode**: PNG, alpha preserved
//!
//! Degradations (overlay or transform unavailable) never fail the
//! composition; they are reported as [`ComposeWarning`]s next to the image.

pub mod encoding;
pub mod overlay;
pub mod processing;
pub mod surface;
pub mod text;

pub use encoding::EncodingFormat;
pub use overlay::{OverlayFit, OverlayRect};
pub use surface::DrawingSurface;

use crate::app::state::FilterSelection;
use crate::backends::camera::types::{FrameOrigin, SourceFrame};
use crate::config::ComposeConfig;
use crate::errors::{BoothError, BoothResult, NotReadyReason, TemplateLoadError, TransformError};
use crate::pipelines::transform::TransformClient;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What goes on top of the frame
#[derive(Debug, Clone)]
pub enum OverlayLayer {
    /// Text mode: caption centered near the bottom, watermark bottom-right
    Captions { caption: String, watermark: String },
    /// Decoded template image
    Image(Arc<RgbaImage>),
    /// A template is configured but could not be loaded; frame only
    Unavailable(TemplateLoadError),
}

/// Something that went wrong but did not stop the photo from being produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeWarning {
    Template(TemplateLoadError),
    Transform(TransformError),
}

impl std::fmt::Display for ComposeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeWarning::Template(e) => write!(f, "{}", e),
            ComposeWarning::Transform(e) => write!(f, "{}", e),
        }
    }
}

/// Final composed photo
#[derive(Debug, Clone)]
pub struct ComposedImage {
    /// PNG-encoded pixels
    pub png: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Filter the user selected
    pub filter: FilterSelection,
    pub origin: FrameOrigin,
    pub created_at: DateTime<Utc>,
}

impl ComposedImage {
    pub fn data_url(&self) -> String {
        encoding::to_data_url(&self.png, EncodingFormat::Png.mime_type())
    }
}

/// A composed image together with the degradations that happened on the way
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub image: ComposedImage,
    pub warnings: Vec<ComposeWarning>,
}

/// Complete composition pipeline
///
/// Owns the drawing surface, so one pipeline composes one photo at a time.
pub struct PhotoPipeline {
    surface: DrawingSurface,
    transform: Option<Arc<TransformClient>>,
    config: ComposeConfig,
}

impl PhotoPipeline {
    pub fn new(config: ComposeConfig, transform: Option<Arc<TransformClient>>) -> Self {
        Self {
            surface: DrawingSurface::new(),
            transform,
            config,
        }
    }

    pub fn has_transform(&self) -> bool {
        self.transform.is_some()
    }

    /// Compose one photo
    ///
    /// # Returns
    /// * `Ok(ComposeOutcome)` - Image at the source's native size plus warnings
    /// * `Err(BoothError::CaptureNotReady)` - Source has zero dimensions
    /// * `Err(BoothError)` - Drawing or encoding failed; nothing is kept
    pub async fn compose(
        &mut self,
        source: &SourceFrame,
        filter: FilterSelection,
        layer: &OverlayLayer,
    ) -> BoothResult<ComposeOutcome> {
        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            return Err(BoothError::CaptureNotReady(NotReadyReason::ZeroDimensions));
        }

        info!(
            width,
            height,
            %filter,
            mirrored = source.mirrored,
            "Starting composition"
        );

        let mut warnings = Vec::new();

        // Stage 1 & 2: prepare the surface and draw the frame
        let canvas = self.surface.take_prepared(width, height);
        let frame = source.frame.clone();
        let mirrored = source.mirrored;
        let local = filter.local();
        let mut canvas = run_blocking("draw", move || {
            let mut canvas = canvas;
            processing::draw_frame(&mut canvas, &frame, mirrored, local)?;
            Ok(canvas)
        })
        .await?;

        // Stage 3: AI transform
        if let FilterSelection::Ai(style) = filter {
            match &self.transform {
                Some(client) => match client.transform(canvas.clone(), style).await {
                    Ok(result) => {
                        canvas = run_blocking("transform result", move || {
                            processing::replace_scaled(&mut canvas, &result);
                            Ok(canvas)
                        })
                        .await?;
                    }
                    Err(e) => {
                        warn!(error = %e, "AI filter failed, using original frame");
                        warnings.push(ComposeWarning::Transform(e));
                    }
                },
                None => {
                    let e = TransformError::new(
                        style,
                        crate::errors::TransformFailure::Network(
                            "no transform service configured".into(),
                        ),
                    );
                    warn!(error = %e, "AI filter unavailable, using original frame");
                    warnings.push(ComposeWarning::Transform(e));
                }
            }
        }

        // Stage 4: overlay
        let fit = self.config.overlay_fit;
        let font_scale = self.config.font_scale;
        let layer = layer.clone();
        if let OverlayLayer::Unavailable(e) = &layer {
            warn!(error = %e, "Composing without template overlay");
            warnings.push(ComposeWarning::Template(e.clone()));
        }

        // Stage 5: encode
        let (canvas, png) = run_blocking("overlay", move || {
            let mut canvas = canvas;
            match &layer {
                OverlayLayer::Image(overlay) => overlay::draw_overlay(&mut canvas, overlay, fit),
                OverlayLayer::Captions { caption, watermark } => {
                    overlay::draw_captions(&mut canvas, caption, watermark, font_scale)
                }
                OverlayLayer::Unavailable(_) => {}
            }
            let png = encoding::encode_png(&canvas)?;
            Ok((canvas, png))
        })
        .await?;

        debug_assert_eq!(canvas.dimensions(), (width, height));
        self.surface.restore(canvas);

        debug!(size = png.len(), warnings = warnings.len(), "Composition complete");

        Ok(ComposeOutcome {
            image: ComposedImage {
                png: Arc::from(png.into_boxed_slice()),
                width,
                height,
                filter,
                origin: source.origin,
                created_at: Utc::now(),
            },
            warnings,
        })
    }
}

async fn run_blocking<T, F>(stage: &'static str, f: F) -> BoothResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BoothError::InvalidImage(format!("{} task error: {}", stage, e)))?
        .map_err(|e| BoothError::InvalidImage(format!("{} failed: {}", stage, e)))
}
