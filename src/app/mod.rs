// SPDX-License-Identifier: MPL-2.0

//! Booth application layer
//!
//! # Architecture
//!
//! - `state`: Session states, filter selection, control availability
//! - `template`: Active overlay configuration and change tracking
//! - `session`: Capture session state machine
//! - `admin`: Moderation, settings and template management
//!
//! # Main Types
//!
//! - [`BoothContext`]: Everything built once at startup and passed down
//! - [`CaptureSession`]: One booth screen's worth of state

pub mod admin;
pub mod session;
pub mod state;
pub mod template;

pub use admin::AdminService;
pub use session::{CaptureCompletion, CaptureJob, CaptureResult, CaptureSession};
pub use state::{AiStyle, Controls, FilterSelection, LocalFilter, SessionState};
pub use template::{TemplateConfig, TemplateResolver, TemplateSubscription};

use crate::backends::camera::{CameraBackend, DeviceMediaSource};
use crate::backends::remote::{self, Collaborators};
use crate::config::Config;
use crate::errors::BoothResult;
use crate::pipelines::photo::PhotoPipeline;
use crate::pipelines::publish::PublishPipeline;
use crate::pipelines::transform::TransformClient;
use crate::storage::{DirectoryDownloads, DownloadSink};
use std::sync::Arc;
use tracing::info;

/// Application context
///
/// Constructed once at startup, handed to every session by reference, and
/// torn down with [`BoothContext::shutdown`].
pub struct BoothContext {
    pub config: Config,
    pub remote: Collaborators,
    pub templates: Arc<TemplateResolver>,
    pub transform: Option<Arc<TransformClient>>,
    pub downloads: Arc<dyn DownloadSink>,
}

impl BoothContext {
    /// Connect to the configured backend and load the active template
    pub async fn connect(config: Config) -> BoothResult<Self> {
        let remote = remote::connect(&config.backend).await?;
        let transform = TransformClient::from_config(&config.backend, &config.transform);
        let downloads = Arc::new(DirectoryDownloads::new(
            config.publish.resolved_download_dir(),
        ));
        Ok(Self::with_parts(config, remote, transform.map(Arc::new), downloads).await)
    }

    /// Assemble from already-built collaborators
    pub async fn with_parts(
        config: Config,
        remote: Collaborators,
        transform: Option<Arc<TransformClient>>,
        downloads: Arc<dyn DownloadSink>,
    ) -> Self {
        let templates = Arc::new(
            TemplateResolver::connect(remote.settings.clone(), remote.fetcher.clone()).await,
        );
        info!(
            ai_filters = transform.is_some(),
            overlay = templates.get_active().has_overlay(),
            "Booth context ready"
        );
        Self {
            config,
            remote,
            templates,
            transform,
            downloads,
        }
    }

    /// A capture session on `camera`
    pub fn session(&self, camera: Arc<dyn CameraBackend>) -> CaptureSession {
        let source = DeviceMediaSource::new(camera, self.config.camera.clone());
        CaptureSession::new(source, self.templates.clone(), self.compositor(), self.publisher())
    }

    pub fn compositor(&self) -> PhotoPipeline {
        PhotoPipeline::new(self.config.compose.clone(), self.transform.clone())
    }

    pub fn publisher(&self) -> PublishPipeline {
        PublishPipeline::new(
            self.remote.assets.clone(),
            self.remote.records.clone(),
            self.downloads.clone(),
            self.config.publish.clone(),
        )
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(
            self.remote.settings.clone(),
            self.remote.assets.clone(),
            self.remote.records.clone(),
        )
    }

    /// Cancel change subscriptions
    pub fn shutdown(&self) {
        self.templates.shutdown();
    }
}

impl std::fmt::Debug for BoothContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoothContext")
            .field("config", &self.config)
            .field("templates", &self.templates)
            .field("ai_filters", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}
