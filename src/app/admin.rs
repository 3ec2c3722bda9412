// SPDX-License-Identifier: GPL-3.0-only

//! Operator actions: moderation, settings and templates

use crate::backends::remote::{
    AssetStore, BoothSettings, PhotoRecord, PhotoRecords, SettingsSource, TemplateRecord,
    object_name_from_url,
};
use crate::constants;
use crate::errors::{BoothError, BoothResult};
use crate::pipelines::photo::encoding;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Moderation and configuration on top of the remote collaborators
pub struct AdminService {
    settings: Arc<dyn SettingsSource>,
    assets: Arc<dyn AssetStore>,
    records: Arc<dyn PhotoRecords>,
}

impl AdminService {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        assets: Arc<dyn AssetStore>,
        records: Arc<dyn PhotoRecords>,
    ) -> Self {
        Self {
            settings,
            assets,
            records,
        }
    }

    /// Every photo, newest first
    pub async fn photos(&self) -> BoothResult<Vec<PhotoRecord>> {
        Ok(self.records.list().await?)
    }

    /// Photos shown in the feed and slideshow
    pub async fn approved_photos(&self) -> BoothResult<Vec<PhotoRecord>> {
        let mut photos = self.records.list().await?;
        photos.retain(|p| p.approved);
        Ok(photos)
    }

    pub async fn set_approved(&self, id: &str, approved: bool) -> BoothResult<()> {
        self.records.set_approved(id, approved).await?;
        info!(id, approved, "Photo moderation updated");
        Ok(())
    }

    /// Delete the stored object, then the row
    pub async fn delete_photo(&self, id: &str) -> BoothResult<()> {
        let photos = self.records.list().await?;
        let photo = photos
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| BoothError::Backend(format!("photo {} not found", id)))?;

        if let Some(name) = object_name_from_url(&photo.image_url) {
            self.assets.remove(&[name]).await?;
        } else {
            warn!(url = %photo.image_url, "Photo URL has no object name, deleting row only");
        }
        self.records.delete(id).await?;
        info!(id, "Photo deleted");
        Ok(())
    }

    /// Delete every photo and its stored object; template images are kept
    ///
    /// Returns how many objects were removed.
    pub async fn delete_all_photos(&self) -> BoothResult<usize> {
        let templates = self.settings.fetch_templates().await?;
        let settings = self.settings.fetch_settings().await?;
        let protected: HashSet<String> = templates
            .iter()
            .map(|t| t.image_url.as_str())
            .chain(settings.template_image_url.as_deref())
            .filter_map(object_name_from_url)
            .collect();

        let names: Vec<String> = self
            .assets
            .list()
            .await?
            .into_iter()
            .filter(|name| !protected.contains(name))
            .collect();

        self.assets.remove(&names).await?;
        self.records.delete_all().await?;
        info!(objects = names.len(), "All photos deleted");
        Ok(names.len())
    }

    pub async fn settings(&self) -> BoothResult<BoothSettings> {
        Ok(self.settings.fetch_settings().await?)
    }

    /// Save the settings row; subscribers are notified by the source
    pub async fn save_settings(&self, settings: BoothSettings) -> BoothResult<BoothSettings> {
        if settings.slideshow_duration == 0 {
            return Err(BoothError::Config(
                "slideshow duration must be at least one second".into(),
            ));
        }
        let saved = self.settings.update_settings(settings).await?;
        info!("Settings saved");
        Ok(saved)
    }

    pub async fn templates(&self) -> BoothResult<Vec<TemplateRecord>> {
        Ok(self.settings.fetch_templates().await?)
    }

    /// Store a template image and make it the only active template
    ///
    /// The bytes must decode as an image; they are stored as given.
    pub async fn upload_template(&self, name: &str, bytes: Vec<u8>) -> BoothResult<TemplateRecord> {
        let bytes: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());
        let check = bytes.clone();
        let (width, height) = tokio::task::spawn_blocking(move || encoding::decode_rgba(&check))
            .await
            .map_err(|e| BoothError::InvalidImage(format!("decode task error: {}", e)))?
            .map_err(BoothError::InvalidImage)?
            .dimensions();

        let file_name = format!(
            "{}-{}.png",
            constants::publish::TEMPLATE_PREFIX,
            chrono::Utc::now().timestamp_millis()
        );
        self.assets
            .upload(&file_name, bytes, constants::publish::CONTENT_TYPE)
            .await?;
        let url = self.assets.public_url(&file_name)?;

        let record = self.settings.insert_template(name, &url).await?;
        self.settings.activate_template(&record.id).await?;
        info!(id = %record.id, width, height, url = %url, "Template uploaded and activated");

        Ok(TemplateRecord {
            active: true,
            ..record
        })
    }

    pub async fn activate_template(&self, id: &str) -> BoothResult<()> {
        self.settings.activate_template(id).await?;
        info!(id, "Template activated");
        Ok(())
    }
}

impl std::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminService").finish_non_exhaustive()
    }
}
