// SPDX-License-Identifier: MPL-2.0

//! In-process stand-ins for the remote collaborators

#![allow(dead_code)]

use chrono::Utc;
use futures::future::BoxFuture;
use image::{Rgba, RgbaImage};
use photobooth::app::{AiStyle, BoothContext};
use photobooth::backends::camera::FacingMode;
use photobooth::backends::remote::{
    AssetStore, BoothSettings, ChangeKind, ChangeTable, Collaborators, ImageFetcher, NewPhoto,
    PhotoRecord, PhotoRecords, RemoteError, RemoteResult, SettingsChange, SettingsSource,
    TemplateRecord,
};
use photobooth::backends::virtual_camera::{VirtualCameraBackend, VirtualDevice};
use photobooth::config::{Config, TransformConfig};
use photobooth::errors::{BoothResult, TransformFailure};
use photobooth::pipelines::photo::encoding;
use photobooth::pipelines::transform::{TransformClient, TransformEndpoint, TransformRequest};
use photobooth::storage::DownloadSink;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const ASSET_BASE: &str = "https://assets.test/photos/";

pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encoding::encode_png(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
}

/// Solid-color virtual camera with one front device
pub fn camera(width: u32, height: u32, color: [u8; 4]) -> Arc<VirtualCameraBackend> {
    Arc::new(
        VirtualCameraBackend::new(RgbaImage::from_pixel(width, height, Rgba(color)))
            .with_devices(vec![VirtualDevice::new(FacingMode::User, &[(width, height)])]),
    )
}

// ---- settings -------------------------------------------------------------

pub struct MemorySettings {
    settings: Mutex<BoothSettings>,
    templates: Mutex<Vec<TemplateRecord>>,
    changes: broadcast::Sender<SettingsChange>,
    pub fail_reads: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            settings: Mutex::new(BoothSettings::default()),
            templates: Mutex::new(Vec::new()),
            changes,
            fail_reads: AtomicBool::new(false),
        }
    }

    fn notify(&self, table: ChangeTable, kind: ChangeKind) {
        let _ = self.changes.send(SettingsChange::new(table, kind));
    }

    /// Replace the templates without notifying anyone
    pub fn set_templates_silently(&self, templates: Vec<TemplateRecord>) {
        *self.templates.lock().unwrap() = templates;
    }

    pub fn template(id: &str, url: &str, active: bool) -> TemplateRecord {
        TemplateRecord {
            id: id.into(),
            name: id.into(),
            image_url: url.into(),
            active,
            updated_at: Some(Utc::now()),
        }
    }
}

impl SettingsSource for MemorySettings {
    fn fetch_settings(&self) -> BoxFuture<'_, RemoteResult<BoothSettings>> {
        Box::pin(async move {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(RemoteError::Network("settings offline".into()));
            }
            Ok(self.settings.lock().unwrap().clone())
        })
    }

    fn fetch_templates(&self) -> BoxFuture<'_, RemoteResult<Vec<TemplateRecord>>> {
        Box::pin(async move {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(RemoteError::Network("settings offline".into()));
            }
            let mut rows = self.templates.lock().unwrap().clone();
            rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(rows)
        })
    }

    fn update_settings(
        &self,
        mut settings: BoothSettings,
    ) -> BoxFuture<'_, RemoteResult<BoothSettings>> {
        Box::pin(async move {
            settings.updated_at = Some(Utc::now());
            *self.settings.lock().unwrap() = settings.clone();
            self.notify(ChangeTable::Settings, ChangeKind::Update);
            Ok(settings)
        })
    }

    fn insert_template<'a>(
        &'a self,
        name: &'a str,
        image_url: &'a str,
    ) -> BoxFuture<'a, RemoteResult<TemplateRecord>> {
        Box::pin(async move {
            let record = TemplateRecord {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.into(),
                image_url: image_url.into(),
                active: false,
                updated_at: Some(Utc::now()),
            };
            self.templates.lock().unwrap().push(record.clone());
            self.notify(ChangeTable::Templates, ChangeKind::Insert);
            Ok(record)
        })
    }

    fn activate_template<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            {
                let mut rows = self.templates.lock().unwrap();
                if !rows.iter().any(|t| t.id == id) {
                    return Err(RemoteError::NotFound(id.into()));
                }
                for row in rows.iter_mut() {
                    row.active = row.id == id;
                    if row.active {
                        row.updated_at = Some(Utc::now());
                    }
                }
            }
            self.notify(ChangeTable::Templates, ChangeKind::Update);
            Ok(())
        })
    }

    fn changes(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}

// ---- assets ---------------------------------------------------------------

#[derive(Default)]
pub struct MemoryAssets {
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub fail_upload: AtomicBool,
    pub uploads: AtomicUsize,
}

impl MemoryAssets {
    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

impl AssetStore for MemoryAssets {
    fn upload<'a>(
        &'a self,
        name: &'a str,
        data: Arc<[u8]>,
        _content_type: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            if self.fail_upload.load(Ordering::SeqCst) {
                return Err(RemoteError::Http {
                    status: 503,
                    message: "storage unavailable".into(),
                });
            }
            self.objects
                .lock()
                .unwrap()
                .insert(name.to_string(), data.to_vec());
            Ok(())
        })
    }

    fn public_url(&self, name: &str) -> RemoteResult<String> {
        Ok(format!("{}{}", ASSET_BASE, name))
    }

    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        Box::pin(async move { Ok(self.names()) })
    }

    fn remove<'a>(&'a self, names: &'a [String]) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let mut objects = self.objects.lock().unwrap();
            for name in names {
                objects.remove(name);
            }
            Ok(())
        })
    }
}

// ---- photo rows -----------------------------------------------------------

#[derive(Default)]
pub struct MemoryRecords {
    pub rows: Mutex<Vec<PhotoRecord>>,
    pub fail_insert: AtomicBool,
}

impl PhotoRecords for MemoryRecords {
    fn insert(&self, photo: NewPhoto) -> BoxFuture<'_, RemoteResult<PhotoRecord>> {
        Box::pin(async move {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(RemoteError::Http {
                    status: 500,
                    message: "insert rejected".into(),
                });
            }
            let record = PhotoRecord {
                id: uuid::Uuid::new_v4().to_string(),
                image_url: photo.image_url,
                created_at: Utc::now(),
                approved: false,
            };
            self.rows.lock().unwrap().push(record.clone());
            Ok(record)
        })
    }

    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<PhotoRecord>>> {
        Box::pin(async move {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        })
    }

    fn set_approved<'a>(
        &'a self,
        id: &'a str,
        approved: bool,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| RemoteError::NotFound(id.into()))?;
            row.approved = approved;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            self.rows.lock().unwrap().retain(|r| r.id != id);
            Ok(())
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move {
            self.rows.lock().unwrap().clear();
            Ok(())
        })
    }
}

// ---- image fetching -------------------------------------------------------

/// Serves registered bytes by URL; the query string is ignored
#[derive(Default)]
pub struct MemoryFetcher {
    images: Mutex<HashMap<String, Vec<u8>>>,
    pub fetches: AtomicUsize,
    pub requested: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        self.images.lock().unwrap().insert(url.to_string(), bytes);
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(url.to_string());
            let key = url.split('?').next().unwrap_or(url);
            self.images
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(key.to_string()))
        })
    }
}

// ---- AI transform ---------------------------------------------------------

pub enum EndpointBehavior {
    /// Answer with a solid image of this size and color
    Solid { width: u32, height: u32, color: [u8; 4] },
    Fail(TransformFailure),
    /// Answer with this JSON body
    Body(serde_json::Value),
}

pub struct FakeEndpoint {
    pub behavior: Mutex<EndpointBehavior>,
    pub delay: Mutex<Duration>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<(AiStyle, TransformRequest)>>,
}

impl FakeEndpoint {
    pub fn new(behavior: EndpointBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn set(&self, behavior: EndpointBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

impl TransformEndpoint for FakeEndpoint {
    fn invoke<'a>(
        &'a self,
        style: AiStyle,
        request: &'a TransformRequest,
    ) -> BoxFuture<'a, Result<serde_json::Value, TransformFailure>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some((style, request.clone()));

            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let field = match style {
                AiStyle::Stylize => "cartoonImage",
                AiStyle::DeAge => "transformedImage",
            };
            match &*self.behavior.lock().unwrap() {
                EndpointBehavior::Solid {
                    width,
                    height,
                    color,
                } => {
                    let png = png_bytes(*width, *height, *color);
                    let mut body = serde_json::Map::new();
                    body.insert(
                        field.to_string(),
                        serde_json::Value::String(encoding::to_data_url(&png, "image/png")),
                    );
                    Ok(serde_json::Value::Object(body))
                }
                EndpointBehavior::Fail(failure) => Err(failure.clone()),
                EndpointBehavior::Body(body) => Ok(body.clone()),
            }
        })
    }
}

pub fn transform_client(endpoint: Arc<FakeEndpoint>, timeout: Duration) -> TransformClient {
    TransformClient::new(
        endpoint,
        TransformConfig {
            timeout_ms: timeout.as_millis() as u64,
            ..TransformConfig::default()
        },
    )
}

// ---- downloads ------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDownloads {
    pub saved: Mutex<Vec<(String, usize)>>,
    pub fail: AtomicBool,
}

impl DownloadSink for MemoryDownloads {
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        data: Arc<[u8]>,
    ) -> BoxFuture<'a, BoothResult<PathBuf>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(photobooth::BoothError::Storage("disk full".into()));
            }
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), data.len()));
            Ok(PathBuf::from("/downloads").join(file_name))
        })
    }
}

// ---- assembled booth ------------------------------------------------------

pub struct Harness {
    pub settings: Arc<MemorySettings>,
    pub assets: Arc<MemoryAssets>,
    pub records: Arc<MemoryRecords>,
    pub fetcher: Arc<MemoryFetcher>,
    pub downloads: Arc<MemoryDownloads>,
    pub endpoint: Arc<FakeEndpoint>,
    pub context: BoothContext,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(MemorySettings::new()).await
    }

    pub async fn with_settings(settings: MemorySettings) -> Self {
        let settings = Arc::new(settings);
        let assets = Arc::new(MemoryAssets::default());
        let records = Arc::new(MemoryRecords::default());
        let fetcher = Arc::new(MemoryFetcher::default());
        let downloads = Arc::new(MemoryDownloads::default());
        let endpoint = Arc::new(FakeEndpoint::new(EndpointBehavior::Solid {
            width: 64,
            height: 64,
            color: [0, 0, 255, 255],
        }));

        let remote = Collaborators {
            settings: settings.clone(),
            assets: assets.clone(),
            records: records.clone(),
            fetcher: fetcher.clone(),
        };
        let transform = Arc::new(transform_client(endpoint.clone(), Duration::from_secs(5)));
        let context =
            BoothContext::with_parts(Config::default(), remote, Some(transform), downloads.clone())
                .await;

        Self {
            settings,
            assets,
            records,
            fetcher,
            downloads,
            endpoint,
            context,
        }
    }

    /// Register an overlay image and make it the active template
    pub async fn activate_overlay(&self, url: &str, bytes: Vec<u8>) {
        self.fetcher.insert(url, bytes);
        let record = self.settings.insert_template("overlay", url).await.unwrap();
        self.settings.activate_template(&record.id).await.unwrap();
        self.context.templates.refresh().await.unwrap();
    }
}
