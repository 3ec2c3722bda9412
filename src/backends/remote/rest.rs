// SPDX-License-Identifier: GPL-3.0-only

//! REST collaborators
//!
//! Rows live behind a PostgREST style API and objects behind a storage API
//! on the same base URL:
//!
//! ```text
//! {url}/rest/v1/{table}?...                    rows (filters as query params)
//! {url}/storage/v1/object/{bucket}/{name}      upload / delete
//! {url}/storage/v1/object/public/{bucket}/...  public object URLs
//! {url}/storage/v1/object/list/{bucket}        listing
//! ```
//!
//! The API has no push channel the booth can use, so changes are detected by
//! polling the settings and template rows.

use super::{
    AssetStore, BoothSettings, ChangeKind, ChangeTable, NewPhoto, PhotoRecord, PhotoRecords,
    RemoteError, RemoteResult, SettingsChange, SettingsSource, TemplateRecord,
};
use crate::config::BackendConfig;
use crate::constants;
use crate::errors::{BoothError, BoothResult};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Id that no row has; used to address every row in a bulk delete
const NIL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Listing page size for the storage API
const LIST_LIMIT: u32 = 1000;

pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
    photos_table: String,
    settings_table: String,
    templates_table: String,
    changes: broadcast::Sender<SettingsChange>,
}

#[derive(Debug, Deserialize)]
struct StorageObject {
    name: String,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> BoothResult<Arc<Self>> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BoothError::Config(format!("HTTP client: {}", e)))?;
        let (changes, _) = broadcast::channel(constants::settings::CHANGE_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            bucket: config.bucket.clone(),
            photos_table: config.photos_table.clone(),
            settings_table: config.settings_table.clone(),
            templates_table: config.templates_table.clone(),
            changes,
        }))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        if self.api_key.is_empty() {
            builder
        } else {
            builder
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
        }
    }

    fn notify(&self, table: ChangeTable, kind: ChangeKind) {
        let _ = self.changes.send(SettingsChange::new(table, kind));
    }

    /// Poll for settings and template changes until the backend is dropped
    pub fn spawn_change_poller(self: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<Snapshot> = None;

            loop {
                ticker.tick().await;
                let Some(backend) = weak.upgrade() else {
                    debug!("REST backend dropped, stopping change poller");
                    break;
                };

                let snapshot = match backend.snapshot().await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "Change poll failed");
                        continue;
                    }
                };

                if let Some(prev) = &last {
                    if prev.settings != snapshot.settings {
                        backend.notify(ChangeTable::Settings, ChangeKind::Update);
                    }
                    if prev.templates != snapshot.templates {
                        backend.notify(ChangeTable::Templates, ChangeKind::Update);
                    }
                }
                last = Some(snapshot);
            }
        });
    }

    async fn snapshot(&self) -> RemoteResult<Snapshot> {
        let settings = self.fetch_settings_row().await?;
        let templates = self.fetch_template_rows().await?;
        Ok(Snapshot {
            settings: settings.updated_at,
            templates: (
                templates.len(),
                templates.iter().filter_map(|t| t.updated_at).max(),
                templates.iter().find(|t| t.active).map(|t| t.id.clone()),
            ),
        })
    }

    async fn fetch_settings_row(&self) -> RemoteResult<BoothSettings> {
        let url = format!("{}?select=*&limit=1", self.table_url(&self.settings_table));
        let rows: Vec<BoothSettings> = read_json(self.request(Method::GET, &url)).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn fetch_template_rows(&self) -> RemoteResult<Vec<TemplateRecord>> {
        let url = format!(
            "{}?select=*&order=updated_at.desc",
            self.table_url(&self.templates_table)
        );
        read_json(self.request(Method::GET, &url)).await
    }

    async fn patch_templates(&self, filter: &str, body: serde_json::Value) -> RemoteResult<()> {
        let url = format!("{}?{}", self.table_url(&self.templates_table), filter);
        send(self.request(Method::PATCH, &url).json(&body)).await?;
        Ok(())
    }
}

/// What the poller compares between ticks
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    settings: Option<DateTime<Utc>>,
    templates: (usize, Option<DateTime<Utc>>, Option<String>),
}

async fn send(builder: RequestBuilder) -> RemoteResult<Response> {
    let response = builder
        .send()
        .await
        .map_err(|e| RemoteError::Network(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        Err(RemoteError::NotFound(message))
    } else {
        Err(RemoteError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

async fn read_json<T: DeserializeOwned>(builder: RequestBuilder) -> RemoteResult<T> {
    send(builder)
        .await?
        .json::<T>()
        .await
        .map_err(|e| RemoteError::Decode(e.to_string()))
}

/// First row of a `return=representation` response
async fn read_single<T: DeserializeOwned>(builder: RequestBuilder) -> RemoteResult<T> {
    let rows: Vec<T> = read_json(builder.header("Prefer", "return=representation")).await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| RemoteError::Decode("empty representation".into()))
}

impl SettingsSource for RestBackend {
    fn fetch_settings(&self) -> BoxFuture<'_, RemoteResult<BoothSettings>> {
        Box::pin(self.fetch_settings_row())
    }

    fn fetch_templates(&self) -> BoxFuture<'_, RemoteResult<Vec<TemplateRecord>>> {
        Box::pin(self.fetch_template_rows())
    }

    fn update_settings(
        &self,
        mut settings: BoothSettings,
    ) -> BoxFuture<'_, RemoteResult<BoothSettings>> {
        Box::pin(async move {
            settings.updated_at = Some(Utc::now());
            let url = format!(
                "{}?id=eq.{}",
                self.table_url(&self.settings_table),
                settings.id
            );
            let saved: BoothSettings =
                read_single(self.request(Method::PATCH, &url).json(&settings)).await?;
            info!(id = %saved.id, "Settings saved");
            self.notify(ChangeTable::Settings, ChangeKind::Update);
            Ok(saved)
        })
    }

    fn insert_template<'a>(
        &'a self,
        name: &'a str,
        image_url: &'a str,
    ) -> BoxFuture<'a, RemoteResult<TemplateRecord>> {
        Box::pin(async move {
            let url = self.table_url(&self.templates_table);
            let body = serde_json::json!({
                "name": name,
                "image_url": image_url,
                "active": false,
            });
            let record: TemplateRecord =
                read_single(self.request(Method::POST, &url).json(&body)).await?;
            self.notify(ChangeTable::Templates, ChangeKind::Insert);
            Ok(record)
        })
    }

    fn activate_template<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let now = Utc::now();
            self.patch_templates(
                &format!("id=neq.{}&active=eq.true", id),
                serde_json::json!({ "active": false, "updated_at": now }),
            )
            .await?;

            let url = format!("{}?id=eq.{}", self.table_url(&self.templates_table), id);
            let rows: Vec<TemplateRecord> = read_json(
                self.request(Method::PATCH, &url)
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({ "active": true, "updated_at": now })),
            )
            .await?;
            if rows.is_empty() {
                return Err(RemoteError::NotFound(format!("template {}", id)));
            }

            self.notify(ChangeTable::Templates, ChangeKind::Update);
            Ok(())
        })
    }

    fn changes(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}

impl AssetStore for RestBackend {
    fn upload<'a>(
        &'a self,
        name: &'a str,
        data: Arc<[u8]>,
        content_type: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let url = format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, self.bucket, name
            );
            debug!(name, size = data.len(), "Uploading object");
            send(
                self.request(Method::POST, &url)
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .header(
                        reqwest::header::CACHE_CONTROL,
                        format!("max-age={}", constants::publish::CACHE_CONTROL_SECS),
                    )
                    .body(data.to_vec()),
            )
            .await?;
            Ok(())
        })
    }

    fn public_url(&self, name: &str) -> RemoteResult<String> {
        if name.is_empty() {
            return Err(RemoteError::NotFound("empty object name".into()));
        }
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, name
        ))
    }

    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        Box::pin(async move {
            let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
            let objects: Vec<StorageObject> = read_json(
                self.request(Method::POST, &url)
                    .json(&serde_json::json!({ "prefix": "", "limit": LIST_LIMIT })),
            )
            .await?;
            Ok(objects.into_iter().map(|o| o.name).collect())
        })
    }

    fn remove<'a>(&'a self, names: &'a [String]) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            if names.is_empty() {
                return Ok(());
            }
            let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
            send(
                self.request(Method::DELETE, &url)
                    .json(&serde_json::json!({ "prefixes": names })),
            )
            .await?;
            debug!(count = names.len(), "Removed objects");
            Ok(())
        })
    }
}

impl PhotoRecords for RestBackend {
    fn insert(&self, photo: NewPhoto) -> BoxFuture<'_, RemoteResult<PhotoRecord>> {
        Box::pin(async move {
            let url = self.table_url(&self.photos_table);
            let record: PhotoRecord =
                read_single(self.request(Method::POST, &url).json(&photo)).await?;
            self.notify(ChangeTable::Photos, ChangeKind::Insert);
            Ok(record)
        })
    }

    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<PhotoRecord>>> {
        Box::pin(async move {
            let url = format!(
                "{}?select=*&order=created_at.desc",
                self.table_url(&self.photos_table)
            );
            read_json(self.request(Method::GET, &url)).await
        })
    }

    fn set_approved<'a>(
        &'a self,
        id: &'a str,
        approved: bool,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let url = format!("{}?id=eq.{}", self.table_url(&self.photos_table), id);
            let rows: Vec<PhotoRecord> = read_json(
                self.request(Method::PATCH, &url)
                    .header("Prefer", "return=representation")
                    .json(&serde_json::json!({ "approved": approved })),
            )
            .await?;
            if rows.is_empty() {
                return Err(RemoteError::NotFound(format!("photo {}", id)));
            }
            self.notify(ChangeTable::Photos, ChangeKind::Update);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let url = format!("{}?id=eq.{}", self.table_url(&self.photos_table), id);
            send(self.request(Method::DELETE, &url)).await?;
            self.notify(ChangeTable::Photos, ChangeKind::Delete);
            Ok(())
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move {
            let url = format!(
                "{}?id=neq.{}",
                self.table_url(&self.photos_table),
                NIL_ID
            );
            send(self.request(Method::DELETE, &url)).await?;
            self.notify(ChangeTable::Photos, ChangeKind::Delete);
            Ok(())
        })
    }
}
