// SPDX-License-Identifier: GPL-3.0-only

//! Directory-backed collaborators
//!
//! Layout under the root directory:
//!
//! ```text
//! settings.json    single settings row
//! templates.json   template rows
//! photos.json      photo rows
//! assets/          stored objects, served as file:// URLs
//! ```
//!
//! Change notifications are delivered in-process to every subscriber of this
//! backend instance.

use super::{
    AssetStore, BoothSettings, ChangeKind, ChangeTable, NewPhoto, PhotoRecord, PhotoRecords,
    RemoteError, RemoteResult, SettingsChange, SettingsSource, TemplateRecord,
};
use crate::constants;
use crate::errors::BoothResult;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

const SETTINGS_FILE: &str = "settings.json";
const TEMPLATES_FILE: &str = "templates.json";
const PHOTOS_FILE: &str = "photos.json";
const ASSETS_DIR: &str = "assets";

pub struct LocalBackend {
    root: PathBuf,
    /// Serializes read-modify-write cycles on the row files
    write_lock: Mutex<()>,
    changes: broadcast::Sender<SettingsChange>,
}

impl LocalBackend {
    /// Open (creating if needed) a backend rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> BoothResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join(ASSETS_DIR)).await?;
        let root = tokio::fs::canonicalize(&root).await?;

        info!(root = %root.display(), "Opened local backend");

        let (changes, _) = broadcast::channel(constants::settings::CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
            changes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    fn asset_path(&self, name: &str) -> RemoteResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(RemoteError::Io(format!("invalid object name '{}'", name)));
        }
        Ok(self.assets_dir().join(name))
    }

    fn notify(&self, table: ChangeTable, kind: ChangeKind) {
        // No subscribers is fine
        let _ = self.changes.send(SettingsChange::new(table, kind));
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> RemoteResult<Option<T>> {
        match tokio::fs::read(self.root.join(file)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> RemoteResult<()> {
        let path = self.root.join(file);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_rows<T: DeserializeOwned>(&self, file: &str) -> RemoteResult<Vec<T>> {
        Ok(self.read_json(file).await?.unwrap_or_default())
    }
}

impl SettingsSource for LocalBackend {
    fn fetch_settings(&self) -> BoxFuture<'_, RemoteResult<BoothSettings>> {
        Box::pin(async move { Ok(self.read_json(SETTINGS_FILE).await?.unwrap_or_default()) })
    }

    fn fetch_templates(&self) -> BoxFuture<'_, RemoteResult<Vec<TemplateRecord>>> {
        Box::pin(async move {
            let mut rows: Vec<TemplateRecord> = self.read_rows(TEMPLATES_FILE).await?;
            rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(rows)
        })
    }

    fn update_settings(
        &self,
        mut settings: BoothSettings,
    ) -> BoxFuture<'_, RemoteResult<BoothSettings>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            settings.updated_at = Some(Utc::now());
            self.write_json(SETTINGS_FILE, &settings).await?;
            drop(_guard);

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
            let _guard = self.write_lock.lock().await;
            let mut rows: Vec<TemplateRecord> = self.read_rows(TEMPLATES_FILE).await?;
            let record = TemplateRecord {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                image_url: image_url.to_string(),
                active: false,
                updated_at: Some(Utc::now()),
            };
            rows.push(record.clone());
            self.write_json(TEMPLATES_FILE, &rows).await?;
            drop(_guard);

            self.notify(ChangeTable::Templates, ChangeKind::Insert);
            Ok(record)
        })
    }

    fn activate_template<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut rows: Vec<TemplateRecord> = self.read_rows(TEMPLATES_FILE).await?;
            if !rows.iter().any(|t| t.id == id) {
                return Err(RemoteError::NotFound(format!("template {}", id)));
            }
            let now = Utc::now();
            for row in rows.iter_mut() {
                let active = row.id == id;
                if row.active != active || active {
                    row.active = active;
                    row.updated_at = Some(now);
                }
            }
            self.write_json(TEMPLATES_FILE, &rows).await?;
            drop(_guard);

            self.notify(ChangeTable::Templates, ChangeKind::Update);
            Ok(())
        })
    }

    fn changes(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}

impl AssetStore for LocalBackend {
    fn upload<'a>(
        &'a self,
        name: &'a str,
        data: Arc<[u8]>,
        content_type: &'a str,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let path = self.asset_path(name)?;
            debug!(name, content_type, size = data.len(), "Storing object");
            tokio::fs::write(&path, &data[..]).await?;
            Ok(())
        })
    }

    fn public_url(&self, name: &str) -> RemoteResult<String> {
        let path = self.asset_path(name)?;
        Ok(format!("file://{}", path.display()))
    }

    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        Box::pin(async move {
            let mut names = Vec::new();
            let mut entries = tokio::fs::read_dir(self.assets_dir()).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file()
                    && let Some(name) = entry.file_name().to_str()
                {
                    names.push(name.to_string());
                }
            }
            names.sort();
            Ok(names)
        })
    }

    fn remove<'a>(&'a self, names: &'a [String]) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            for name in names {
                let path = self.asset_path(name)?;
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!(name = %name, "Removed object"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        })
    }
}

impl PhotoRecords for LocalBackend {
    fn insert(&self, photo: NewPhoto) -> BoxFuture<'_, RemoteResult<PhotoRecord>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut rows: Vec<PhotoRecord> = self.read_rows(PHOTOS_FILE).await?;
            let record = PhotoRecord {
                id: uuid::Uuid::new_v4().to_string(),
                image_url: photo.image_url,
                created_at: Utc::now(),
                approved: false,
            };
            rows.push(record.clone());
            self.write_json(PHOTOS_FILE, &rows).await?;
            drop(_guard);

            self.notify(ChangeTable::Photos, ChangeKind::Insert);
            Ok(record)
        })
    }

    fn list(&self) -> BoxFuture<'_, RemoteResult<Vec<PhotoRecord>>> {
        Box::pin(async move {
            let mut rows: Vec<PhotoRecord> = self.read_rows(PHOTOS_FILE).await?;
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
            let _guard = self.write_lock.lock().await;
            let mut rows: Vec<PhotoRecord> = self.read_rows(PHOTOS_FILE).await?;
            let row = rows
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| RemoteError::NotFound(format!("photo {}", id)))?;
            row.approved = approved;
            self.write_json(PHOTOS_FILE, &rows).await?;
            drop(_guard);

            self.notify(ChangeTable::Photos, ChangeKind::Update);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut rows: Vec<PhotoRecord> = self.read_rows(PHOTOS_FILE).await?;
            let before = rows.len();
            rows.retain(|p| p.id != id);
            if rows.len() == before {
                return Err(RemoteError::NotFound(format!("photo {}", id)));
            }
            self.write_json(PHOTOS_FILE, &rows).await?;
            drop(_guard);

            self.notify(ChangeTable::Photos, ChangeKind::Delete);
            Ok(())
        })
    }

    fn delete_all(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            self.write_json(PHOTOS_FILE, &Vec::<PhotoRecord>::new())
                .await?;
            drop(_guard);

            self.notify(ChangeTable::Photos, ChangeKind::Delete);
            Ok(())
        })
    }
}
