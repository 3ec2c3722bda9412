// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! Owns the camera, the compositor and the publish pipeline and decides which
//! operation is allowed in which [`SessionState`].
//!
//! A capture is split in three so that the slow part can run without holding
//! the session:
//!
//! ```text
//! begin_capture(&mut) ──▶ CaptureJob::run() ──▶ complete_capture(&mut)
//!   grab frame,            load overlay,          stale? drop it
//!   freeze template,       compose (AI?)          else → Reviewing
//!   issue ticket
//! ```
//!
//! Only the job whose ticket is still pending may move the session to
//! `Reviewing`; a retake, cancel or camera stop in between makes any late
//! result stale. A job that goes stale while running abandons its work and
//! releases the compositor straight away.

use super::state::{Controls, FilterSelection, SessionState};
use super::template::{TemplateConfig, TemplateResolver};
use crate::backends::camera::{
    BackendError, DeviceMediaSource, FrameOrigin, MediaFrameSource, SourceFrame,
};
use crate::backends::virtual_camera;
use crate::errors::{BoothError, BoothResult, CameraFailure, NotReadyReason};
use crate::pipelines::photo::{ComposeOutcome, ComposeWarning, ComposedImage, PhotoPipeline};
use crate::pipelines::publish::{PublishPipeline, PublishReceipt};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

/// Work of one capture, detached from the session
pub struct CaptureJob {
    ticket: u64,
    source: SourceFrame,
    filter: FilterSelection,
    template: TemplateConfig,
    resolver: Arc<TemplateResolver>,
    compositor: Arc<Mutex<PhotoPipeline>>,
    /// Ticket the session is currently waiting for
    pending: watch::Receiver<Option<u64>>,
}

impl CaptureJob {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn filter(&self) -> FilterSelection {
        self.filter
    }

    /// Template configuration frozen when the capture began
    pub fn template(&self) -> &TemplateConfig {
        &self.template
    }

    /// Load the overlay and compose
    ///
    /// Stops early, without a result, once the session no longer waits for
    /// this ticket.
    pub async fn run(self) -> CaptureResult {
        let CaptureJob {
            ticket,
            source,
            filter,
            template,
            resolver,
            compositor,
            mut pending,
        } = self;

        let work = async {
            let layer = resolver.load_layer(&template).await;
            compositor
                .lock()
                .await
                .compose(&source, filter, &layer)
                .await
        };

        let outcome = tokio::select! {
            outcome = work => Some(outcome),
            _ = pending.wait_for(|p| *p != Some(ticket)) => {
                debug!(ticket, "Capture abandoned");
                None
            }
        };
        CaptureResult { ticket, outcome }
    }
}

impl std::fmt::Debug for CaptureJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureJob")
            .field("ticket", &self.ticket)
            .field("filter", &self.filter)
            .field("size", &(self.source.width(), self.source.height()))
            .finish_non_exhaustive()
    }
}

/// Result of [`CaptureJob::run`], handed back to [`CaptureSession::complete_capture`]
#[derive(Debug)]
pub struct CaptureResult {
    ticket: u64,
    /// None when the job was abandoned
    outcome: Option<BoothResult<ComposeOutcome>>,
}

impl CaptureResult {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn is_abandoned(&self) -> bool {
        self.outcome.is_none()
    }
}

/// What happened to a finished capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCompletion {
    /// The session is now reviewing the photo
    Accepted { warnings: Vec<ComposeWarning> },
    /// The session moved on before the result arrived; it was discarded
    Stale,
}

/// Booth capture session state machine
pub struct CaptureSession {
    state: SessionState,
    camera: DeviceMediaSource,
    templates: Arc<TemplateResolver>,
    compositor: Arc<Mutex<PhotoPipeline>>,
    publisher: PublishPipeline,
    filter: FilterSelection,
    /// Ticket of the capture in flight
    pending: Option<u64>,
    pending_tx: watch::Sender<Option<u64>>,
    next_ticket: u64,
    review: Option<ComposedImage>,
    receipt: Option<PublishReceipt>,
    camera_error: Option<CameraFailure>,
}

impl CaptureSession {
    pub fn new(
        camera: DeviceMediaSource,
        templates: Arc<TemplateResolver>,
        compositor: PhotoPipeline,
        publisher: PublishPipeline,
    ) -> Self {
        Self {
            state: SessionState::CameraOff,
            camera,
            templates,
            compositor: Arc::new(Mutex::new(compositor)),
            publisher,
            filter: FilterSelection::default(),
            pending: None,
            pending_tx: watch::Sender::new(None),
            next_ticket: 0,
            review: None,
            receipt: None,
            camera_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn filter(&self) -> FilterSelection {
        self.filter
    }

    /// Photo being reviewed
    pub fn review(&self) -> Option<&ComposedImage> {
        self.review.as_ref()
    }

    /// Receipt of the reviewed photo, once published
    pub fn receipt(&self) -> Option<&PublishReceipt> {
        self.receipt.as_ref()
    }

    /// Why the camera last failed to start
    pub fn camera_error(&self) -> Option<&CameraFailure> {
        self.camera_error.as_ref()
    }

    pub fn camera(&self) -> &DeviceMediaSource {
        &self.camera
    }

    pub fn is_capture_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Controls the UI should enable right now
    pub fn controls(&self) -> Controls {
        match self.state {
            SessionState::CameraOff => Controls {
                turn_on_camera: true,
                upload: self.pending.is_none(),
                ..Controls::default()
            },
            SessionState::CameraLive => {
                let idle = self.pending.is_none();
                Controls {
                    upload: idle,
                    capture: idle && self.camera.ready_dimensions().is_some(),
                    filters: idle,
                    mirror: true,
                    switch_camera: idle,
                    ..Controls::default()
                }
            }
            SessionState::Reviewing => Controls {
                save: true,
                retake: true,
                ..Controls::default()
            },
        }
    }

    fn not_allowed(&self, action: &'static str) -> BoothError {
        BoothError::NotAllowed {
            action,
            state: self.state,
        }
    }

    /// Turn the camera on (or restart it)
    pub async fn start_camera(&mut self) -> BoothResult<MediaFrameSource> {
        if self.state == SessionState::Reviewing {
            return Err(self.not_allowed("turning on the camera"));
        }
        self.set_pending(None);

        match self.camera.start().await {
            Ok(info) => {
                info!(width = info.width, height = info.height, "Camera live");
                self.camera_error = None;
                self.state = SessionState::CameraLive;
                Ok(info)
            }
            Err(e) => {
                error!(error = %e, "Camera unavailable");
                self.camera_error = Some(e.clone());
                self.state = SessionState::CameraOff;
                Err(BoothError::CameraUnavailable(e))
            }
        }
    }

    /// Turn the camera off; a capture in flight becomes stale
    pub fn stop_camera(&mut self) -> BoothResult<()> {
        match self.state {
            SessionState::Reviewing => Err(self.not_allowed("turning off the camera")),
            SessionState::CameraOff => Ok(()),
            SessionState::CameraLive => {
                self.camera.stop();
                self.set_pending(None);
                self.state = SessionState::CameraOff;
                info!("Camera off");
                Ok(())
            }
        }
    }

    pub fn toggle_mirror(&mut self) -> BoothResult<bool> {
        if self.state != SessionState::CameraLive {
            return Err(self.not_allowed("mirroring"));
        }
        let mirrored = self.camera.toggle_mirror();
        debug!(mirrored, "Mirror toggled");
        Ok(mirrored)
    }

    /// Switch between the user-facing and environment-facing camera
    pub async fn switch_camera(&mut self) -> BoothResult<MediaFrameSource> {
        if self.state != SessionState::CameraLive {
            return Err(self.not_allowed("switching cameras"));
        }
        if self.pending.is_some() {
            return Err(BoothError::CaptureNotReady(NotReadyReason::TransformPending));
        }

        match self.camera.switch_facing().await {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!(error = %e, "Camera switch failed");
                if !self.camera.is_active() {
                    self.camera_error = Some(e.clone());
                    self.state = SessionState::CameraOff;
                }
                Err(BoothError::CameraUnavailable(e))
            }
        }
    }

    pub fn select_filter(&mut self, filter: FilterSelection) -> BoothResult<()> {
        if self.state != SessionState::CameraLive {
            return Err(self.not_allowed("choosing a filter"));
        }
        if self.pending.is_some() {
            return Err(BoothError::CaptureNotReady(NotReadyReason::TransformPending));
        }
        info!(%filter, "Filter selected");
        self.filter = filter;
        Ok(())
    }

    /// Grab the current frame and hand out the work of composing it
    ///
    /// Rejections (camera off, no frame yet, capture already in flight,
    /// already reviewing) change nothing.
    pub fn begin_capture(&mut self) -> BoothResult<CaptureJob> {
        match self.state {
            SessionState::CameraOff => {
                return Err(BoothError::CaptureNotReady(NotReadyReason::CameraOff));
            }
            SessionState::Reviewing => {
                return Err(BoothError::CaptureNotReady(NotReadyReason::Reviewing));
            }
            SessionState::CameraLive => {}
        }
        if self.pending.is_some() {
            return Err(BoothError::CaptureNotReady(NotReadyReason::TransformPending));
        }
        if self.camera.ready_dimensions().is_none() {
            return Err(BoothError::CaptureNotReady(NotReadyReason::ZeroDimensions));
        }

        let source = self.camera.grab().map_err(|e| match e {
            BackendError::NotReady => BoothError::CaptureNotReady(NotReadyReason::ZeroDimensions),
            BackendError::Stopped => BoothError::CaptureNotReady(NotReadyReason::CameraOff),
            other => BoothError::CameraUnavailable(CameraFailure::Backend(other.to_string())),
        })?;

        Ok(self.issue_job(source))
    }

    /// Decode an uploaded image and hand out the work of composing it
    pub async fn upload(&mut self, bytes: Vec<u8>) -> BoothResult<CaptureJob> {
        if self.state == SessionState::Reviewing {
            return Err(self.not_allowed("uploading"));
        }
        if self.pending.is_some() {
            return Err(BoothError::CaptureNotReady(NotReadyReason::TransformPending));
        }

        let frame = tokio::task::spawn_blocking(move || virtual_camera::decode_frame(&bytes))
            .await
            .map_err(|e| BoothError::InvalidImage(format!("decode task error: {}", e)))?
            .map_err(|e| BoothError::InvalidImage(e.to_string()))?;

        info!(width = frame.width, height = frame.height, "Uploaded image accepted");
        let source = SourceFrame {
            frame,
            mirrored: false,
            origin: FrameOrigin::Upload,
        };
        Ok(self.issue_job(source))
    }

    fn issue_job(&mut self, source: SourceFrame) -> CaptureJob {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.set_pending(Some(ticket));

        let template = self.templates.get_active();
        debug!(
            ticket,
            filter = %self.filter,
            overlay = template.overlay_url.as_deref().unwrap_or("none"),
            "Capture started"
        );

        CaptureJob {
            ticket,
            source,
            filter: self.filter,
            template,
            resolver: self.templates.clone(),
            compositor: self.compositor.clone(),
            pending: self.pending_tx.subscribe(),
        }
    }

    fn set_pending(&mut self, ticket: Option<u64>) {
        self.pending = ticket;
        self.pending_tx.send_replace(ticket);
    }

    /// Drop the capture in flight; its result will be stale
    pub fn cancel_capture(&mut self) {
        if let Some(ticket) = self.pending {
            self.set_pending(None);
            debug!(ticket, "Capture cancelled");
        }
    }

    /// Apply a finished capture
    ///
    /// # Returns
    /// * `Ok(Accepted)` - Now reviewing; warnings list the skipped overlay or AI filter
    /// * `Ok(Stale)` - The session moved on; the result was discarded
    /// * `Err(BoothError)` - Composition failed; the session stays where it was
    pub fn complete_capture(&mut self, result: CaptureResult) -> BoothResult<CaptureCompletion> {
        let outcome = match result.outcome {
            Some(outcome) if self.pending == Some(result.ticket) => outcome,
            _ => {
                debug!(ticket = result.ticket, "Discarding stale capture result");
                return Ok(CaptureCompletion::Stale);
            }
        };
        self.set_pending(None);

        let outcome = outcome.inspect_err(|e| {
            error!(error = %e, "Capture failed");
        })?;

        for warning in &outcome.warnings {
            warn!(warning = %warning, "Photo composed with degradation");
        }

        // Reviewing holds no camera
        self.camera.stop();
        info!(
            width = outcome.image.width,
            height = outcome.image.height,
            "Reviewing photo"
        );
        self.review = Some(outcome.image);
        self.receipt = None;
        self.state = SessionState::Reviewing;

        Ok(CaptureCompletion::Accepted {
            warnings: outcome.warnings,
        })
    }

    /// Capture and compose in one go
    pub async fn capture(&mut self) -> BoothResult<CaptureCompletion> {
        let job = self.begin_capture()?;
        let result = job.run().await;
        self.complete_capture(result)
    }

    /// Upload and compose in one go
    pub async fn capture_upload(&mut self, bytes: Vec<u8>) -> BoothResult<CaptureCompletion> {
        let job = self.upload(bytes).await?;
        let result = job.run().await;
        self.complete_capture(result)
    }

    /// Persist the reviewed photo
    ///
    /// A failure leaves the photo in review so saving can be retried. Saving
    /// an already published photo returns the earlier receipt.
    pub async fn publish(&mut self) -> BoothResult<PublishReceipt> {
        if self.state != SessionState::Reviewing {
            return Err(self.not_allowed("saving"));
        }
        if let Some(receipt) = &self.receipt {
            debug!(url = %receipt.public_url, "Photo already published");
            return Ok(receipt.clone());
        }
        let image = self
            .review
            .as_ref()
            .ok_or_else(|| self.not_allowed("saving"))?;

        let receipt = self.publisher.publish(image).await?;
        self.receipt = Some(receipt.clone());
        Ok(receipt)
    }

    /// Discard the reviewed photo and turn the camera back on
    pub async fn retake(&mut self) -> BoothResult<MediaFrameSource> {
        if self.state != SessionState::Reviewing {
            return Err(self.not_allowed("retaking"));
        }
        self.review = None;
        self.receipt = None;
        self.set_pending(None);
        self.state = SessionState::CameraOff;
        info!("Retake");

        self.start_camera().await
    }

    /// Release everything; the session ends up `CameraOff`
    pub fn shutdown(&mut self) {
        self.camera.stop();
        self.set_pending(None);
        self.review = None;
        self.receipt = None;
        self.state = SessionState::CameraOff;
        self.templates.shutdown();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("filter", &self.filter)
            .field("pending", &self.pending)
            .field("camera", &self.camera)
            .finish_non_exhaustive()
    }
}
