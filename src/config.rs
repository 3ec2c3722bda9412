// SPDX-License-Identifier: GPL-3.0-only

//! Booth configuration
//!
//! Constructed once at startup and passed down explicitly; nothing in the crate
//! reads configuration from globals.

use crate::backends::camera::FacingMode;
use crate::constants::{self, AspectRatio};
use crate::errors::{BoothError, BoothResult};
use crate::pipelines::photo::OverlayFit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding `backend.url`
pub const ENV_BACKEND_URL: &str = "PHOTOBOOTH_BACKEND_URL";
/// Environment variable overriding `backend.api_key`
pub const ENV_API_KEY: &str = "PHOTOBOOTH_API_KEY";

/// Which implementation backs the settings rows, photo rows and asset store
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Directory on this machine (offline events, tests)
    #[default]
    Local,
    /// HTTP REST API (rows + storage buckets)
    Rest,
}

/// Remote collaborator settings
#[derive(Debug, Clone, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL of the REST API (rest backend)
    pub url: String,
    /// Anonymous API key sent as `apikey` and bearer token (rest backend)
    pub api_key: String,
    /// Root directory (local backend)
    pub data_dir: Option<PathBuf>,
    /// Storage bucket for photos and templates
    pub bucket: String,
    pub photos_table: String,
    pub settings_table: String,
    pub templates_table: String,
    /// Change polling interval in milliseconds (rest backend)
    pub poll_interval_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: String::new(),
            api_key: String::new(),
            data_dir: None,
            bucket: "photos".to_string(),
            photos_table: "photos".to_string(),
            settings_table: "booth_settings".to_string(),
            templates_table: "templates".to_string(),
            poll_interval_ms: constants::settings::POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl BackendConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    /// Data directory for the local backend
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("photobooth")
        })
    }
}

/// Camera acquisition settings
#[derive(Debug, Clone, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    pub facing: FacingMode,
    pub aspect_ratio: AspectRatio,
    /// Long edge of the ideal resolution
    pub long_edge: u32,
    /// Long edge of the single aspect-ratio retry
    pub safe_long_edge: u32,
    pub ready_timeout_ms: u64,
    /// Mirror the preview by default (selfie mode)
    pub mirror: bool,
    /// Device node of the front camera; first capture device when unset
    pub user_device: Option<String>,
    /// Device node of the rear camera; second capture device when unset
    pub environment_device: Option<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            aspect_ratio: AspectRatio::default(),
            long_edge: constants::camera::DEFAULT_LONG_EDGE,
            safe_long_edge: constants::camera::SAFE_LONG_EDGE,
            ready_timeout_ms: constants::camera::READY_TIMEOUT.as_millis() as u64,
            mirror: true,
            user_device: None,
            environment_device: None,
        }
    }
}

impl CameraConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// AI transform endpoint settings
#[derive(Debug, Clone, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Endpoint for the stylization filter (relative paths resolve against `backend.url`)
    pub stylize_endpoint: String,
    /// Response field carrying the stylized image
    pub stylize_field: String,
    /// Endpoint for the de-aging filter
    pub deage_endpoint: String,
    /// Response field carrying the de-aged image
    pub deage_field: String,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
    pub timeout_ms: u64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            stylize_endpoint: "functions/v1/cartoonify".to_string(),
            stylize_field: "cartoonImage".to_string(),
            deage_endpoint: "functions/v1/de-age".to_string(),
            deage_field: "transformedImage".to_string(),
            max_dimension: constants::transform::MAX_DIMENSION,
            jpeg_quality: constants::transform::JPEG_QUALITY,
            timeout_ms: constants::transform::TIMEOUT.as_millis() as u64,
        }
    }
}

impl TransformConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Publishing settings
#[derive(Debug, Clone, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Prefix of uploaded file names (`<prefix>-<millis>-<suffix>.png`)
    pub file_prefix: String,
    /// Where the local copy lands; defaults to the user's download directory
    pub download_dir: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            file_prefix: constants::publish::DEFAULT_PREFIX.to_string(),
            download_dir: None,
        }
    }
}

impl PublishConfig {
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(crate::storage::default_download_dir)
    }
}

/// Composition settings
#[derive(Debug, Clone, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ComposeConfig {
    pub overlay_fit: OverlayFit,
    /// Multiplier on the caption and watermark size
    pub font_scale: f32,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            overlay_fit: OverlayFit::default(),
            font_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub camera: CameraConfig,
    pub transform: TransformConfig,
    pub publish: PublishConfig,
    pub compose: ComposeConfig,
}

impl Config {
    /// Default config file location (`~/.config/photobooth/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("photobooth").join("config.json"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> BoothResult<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                info!(path = %p.display(), "Loading configuration");
                let text = std::fs::read_to_string(p)?;
                serde_json::from_str(&text)
                    .map_err(|e| BoothError::Config(format!("{}: {}", p.display(), e)))?
            }
            _ => {
                debug!("No configuration file, using defaults");
                Config::default()
            }
        };

        config.apply_env();
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> BoothResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text =
            serde_json::to_string_pretty(self).map_err(|e| BoothError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BACKEND_URL) {
            self.backend.url = url;
            self.backend.kind = BackendKind::Rest;
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            self.backend.api_key = key;
        }
    }
}
