// SPDX-License-Identifier: MPL-2.0

//! Remote collaborators
//!
//! The booth talks to four things it does not own:
//!
//! - [`SettingsSource`]: the settings row and template rows, plus change notifications
//! - [`AssetStore`]: blob storage with public URLs
//! - [`PhotoRecords`]: the photo rows shown in the feed and slideshow
//! - [`ImageFetcher`]: raw bytes for an overlay URL
//!
//! [`local::LocalBackend`] keeps everything in a directory; [`rest::RestBackend`]
//! speaks to a PostgREST/storage style HTTP API.

pub mod fetch;
pub mod local;
pub mod rest;

pub use fetch::UrlImageFetcher;
pub use local::LocalBackend;
pub use rest::RestBackend;

use crate::config::{BackendConfig, BackendKind};
use crate::constants;
use crate::errors::{BoothError, BoothResult};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Error types for remote operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Connection failed or was interrupted
    #[error("network error: {0}")]
    Network(String),
    /// Server answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// Row or object does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Response or stored row could not be parsed
    #[error("invalid data: {0}")]
    Decode(String),
    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RemoteError::NotFound(err.to_string())
        } else {
            RemoteError::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

impl From<RemoteError> for BoothError {
    fn from(err: RemoteError) -> Self {
        BoothError::Backend(err.to_string())
    }
}

/// Slideshow transition between photos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideshowAnimation {
    #[default]
    Fade,
    Slide,
    Zoom,
}

impl std::str::FromStr for SlideshowAnimation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fade" => Ok(SlideshowAnimation::Fade),
            "slide" => Ok(SlideshowAnimation::Slide),
            "zoom" => Ok(SlideshowAnimation::Zoom),
            other => Err(format!("unknown animation '{}'", other)),
        }
    }
}

fn default_settings_id() -> String {
    "default".to_string()
}

fn default_slideshow_duration() -> u32 {
    constants::settings::SLIDESHOW_DURATION_SECS
}

fn default_true() -> bool {
    true
}

/// The booth settings row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothSettings {
    #[serde(default = "default_settings_id")]
    pub id: String,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub watermark: Option<String>,
    /// Legacy single-template overlay
    #[serde(default)]
    pub template_image_url: Option<String>,
    #[serde(default = "default_slideshow_duration")]
    pub slideshow_duration: u32,
    #[serde(default)]
    pub slideshow_animation: SlideshowAnimation,
    #[serde(default = "default_true")]
    pub slideshow_caption_enabled: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for BoothSettings {
    fn default() -> Self {
        Self {
            id: default_settings_id(),
            event_name: None,
            caption: None,
            watermark: None,
            template_image_url: None,
            slideshow_duration: default_slideshow_duration(),
            slideshow_animation: SlideshowAnimation::default(),
            slideshow_caption_enabled: true,
            updated_at: None,
        }
    }
}

/// An uploaded overlay template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A published photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub approved: bool,
}

/// Fields supplied when a photo is recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoto {
    pub image_url: String,
}

/// Which table a change notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTable {
    Settings,
    Templates,
    Photos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Table-level change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingsChange {
    pub table: ChangeTable,
    pub kind: ChangeKind,
}

impl SettingsChange {
    pub fn new(table: ChangeTable, kind: ChangeKind) -> Self {
        Self { table, kind }
    }

    /// Whether this change can alter the active template
    pub fn affects_template(&self) -> bool {
        matches!(self.table, ChangeTable::Settings | ChangeTable::Templates)
    }
}

/// Settings row, template rows and change notifications
pub trait SettingsSource: Send + Sync {
    /// Current settings row (defaults when none exists yet)
    fn fetch_settings(&self) -> BoxFuture<'_, RemoteResult<BoothSettings>>;

    /// All template rows, newest first
    fn fetch_templates(&self) -> BoxFuture<'_, RemoteResult<Vec<TemplateRecord>>>;

    /// Replace the settings row; `updated_at` is stamped by the source
    fn update_settings(&self, settings: BoothSettings)
    -> BoxFuture<'_, RemoteResult<BoothSettings>>;

    /// Record a new template (inactive until activated)
    fn insert_template<'a>(
        &'a self,
        name: &'a str,
        image_url: &'a str,
    ) -> BoxFuture<'a, RemoteResult<TemplateRecord>>;

    /// Make `id` the only active template
    fn activate_template<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>>;

    /// Subscribe to table-level changes
    fn changes(&self) -> broadcast::Receiver<SettingsChange>;
}

/// Blob storage with public URLs
pub trait AssetStore: Send + Sync {
    fn upload<'a>(
        &'a self,
        name: &'a str,
        data: Arc<[u8]>,
        content_type: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>>;

    /// Durable public URL of an uploaded object
    fn public_url(&self, name: &str) -> RemoteResult<String>;

    /// Names of all stored objects
    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>>;

    fn remove<'a>(&'a self, names: &'a [String]) -> BoxFuture<'a, RemoteResult<()>>;
}

/// Photo rows
pub trait PhotoRecords: Send + Sync {
    fn insert(&self, photo: NewPhoto) -> BoxFuture<'_, RemoteResult<PhotoRecord>>;

    /// All photos, newest first
    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<PhotoRecord>>>;

    fn set_approved<'a>(&'a self, id: &'a str, approved: bool)
    -> BoxFuture<'a, RemoteResult<()>>;

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>>;

    fn delete_all(&self) -> BoxFuture<'_, RemoteResult<()>>;
}

/// Raw bytes behind an image URL
pub trait ImageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>>;
}

/// Every remote collaborator the booth needs
#[derive(Clone)]
pub struct Collaborators {
    pub settings: Arc<dyn SettingsSource>,
    pub assets: Arc<dyn AssetStore>,
    pub records: Arc<dyn PhotoRecords>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Build the collaborators selected by the configuration
///
/// The REST backend starts its change poller here, so this must run inside a
/// tokio runtime.
pub async fn connect(config: &BackendConfig) -> BoothResult<Collaborators> {
    let fetcher = Arc::new(UrlImageFetcher::new()?);

    match config.kind {
        BackendKind::Local => {
            let dir = config.resolved_data_dir();
            info!(dir = %dir.display(), "Using local backend");
            let backend = Arc::new(LocalBackend::open(dir).await?);
            Ok(Collaborators {
                settings: backend.clone(),
                assets: backend.clone(),
                records: backend,
                fetcher,
            })
        }
        BackendKind::Rest => {
            if config.url.is_empty() {
                return Err(BoothError::Config(
                    "rest backend selected but backend.url is empty".into(),
                ));
            }
            info!(url = %config.url, "Using REST backend");
            let backend = RestBackend::new(config)?;
            backend.spawn_change_poller(config.poll_interval());
            Ok(Collaborators {
                settings: backend.clone(),
                assets: backend.clone(),
                records: backend,
                fetcher,
            })
        }
    }
}

/// Object name from a public URL (last path segment, query stripped)
pub fn object_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_from_sparse_row() {
        let settings: BoothSettings =
            serde_json::from_str(r#"{ "id": "1", "caption": "Hi" }"#).unwrap();
        assert_eq!(settings.caption.as_deref(), Some("Hi"));
        assert_eq!(settings.slideshow_duration, 5);
        assert!(settings.slideshow_caption_enabled);
        assert_eq!(settings.slideshow_animation, SlideshowAnimation::Fade);
    }

    #[test]
    fn test_object_name_from_url() {
        assert_eq!(
            object_name_from_url("https://x/storage/v1/object/public/photos/a-1.png?v=3"),
            Some("a-1.png".to_string())
        );
        assert_eq!(object_name_from_url("https://x/"), None);
    }

    #[test]
    fn test_template_changes_flagged() {
        assert!(SettingsChange::new(ChangeTable::Templates, ChangeKind::Update).affects_template());
        assert!(!SettingsChange::new(ChangeTable::Photos, ChangeKind::Insert).affects_template());
    }
}
