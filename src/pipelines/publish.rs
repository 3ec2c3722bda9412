// SPDX-License-Identifier: GPL-3.0-only

//! Publish pipeline
//!
//! ```text
//! ComposedImage → upload(name) → public_url(name) → insert { image_url } → local copy
//! ```
//!
//! Persistence comes first. The local copy is only written once the photo is
//! durably stored and recorded; a failed upload or insert never produces a
//! local-only copy.

use crate::backends::remote::{AssetStore, NewPhoto, PhotoRecord, PhotoRecords};
use crate::config::PublishConfig;
use crate::constants;
use crate::errors::PublishError;
use crate::pipelines::photo::ComposedImage;
use crate::storage::{self, DownloadSink};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything that happened during a successful publish
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// Object name in the asset store
    pub file_name: String,
    pub public_url: String,
    pub record: PhotoRecord,
    /// Where the local copy went, or why it could not be written
    pub download: Result<PathBuf, String>,
}

impl PublishReceipt {
    pub fn downloaded(&self) -> bool {
        self.download.is_ok()
    }
}

pub struct PublishPipeline {
    assets: Arc<dyn AssetStore>,
    records: Arc<dyn PhotoRecords>,
    downloads: Arc<dyn DownloadSink>,
    config: PublishConfig,
}

impl PublishPipeline {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        records: Arc<dyn PhotoRecords>,
        downloads: Arc<dyn DownloadSink>,
        config: PublishConfig,
    ) -> Self {
        Self {
            assets,
            records,
            downloads,
            config,
        }
    }

    /// Persist `image`, then hand a copy to the download sink
    ///
    /// # Returns
    /// * `Ok(PublishReceipt)` - Stored and recorded; the receipt says whether the local copy was written
    /// * `Err(PublishError)` - Nothing was recorded and no local copy was made
    pub async fn publish(&self, image: &ComposedImage) -> Result<PublishReceipt, PublishError> {
        if image.png.is_empty() {
            return Err(PublishError::Encode("composed image is empty".into()));
        }

        let file_name = storage::unique_file_name(&self.config.file_prefix);
        info!(name = %file_name, size = image.png.len(), "Publishing photo");

        self.assets
            .upload(&file_name, image.png.clone(), constants::publish::CONTENT_TYPE)
            .await
            .map_err(|e| {
                error!(name = %file_name, error = %e, "Upload failed");
                PublishError::Upload {
                    name: file_name.clone(),
                    reason: e.to_string(),
                }
            })?;

        let public_url = match self.assets.public_url(&file_name) {
            Ok(url) => url,
            Err(e) => {
                error!(name = %file_name, error = %e, "No public URL");
                self.discard_upload(&file_name).await;
                return Err(PublishError::PublicUrl {
                    name: file_name,
                    reason: e.to_string(),
                });
            }
        };

        let record = match self
            .records
            .insert(NewPhoto {
                image_url: public_url.clone(),
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!(url = %public_url, error = %e, "Recording photo failed");
                self.discard_upload(&file_name).await;
                return Err(PublishError::Record {
                    url: public_url,
                    reason: e.to_string(),
                });
            }
        };

        let download = match self.downloads.save(&file_name, image.png.clone()).await {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!(error = %e, "Photo saved but local copy failed");
                Err(e.to_string())
            }
        };

        info!(url = %public_url, id = %record.id, "Photo published");

        Ok(PublishReceipt {
            file_name,
            public_url,
            record,
            download,
        })
    }

    /// Best effort removal of an upload whose record could not be written
    async fn discard_upload(&self, file_name: &str) {
        if let Err(e) = self.assets.remove(&[file_name.to_string()]).await {
            warn!(name = %file_name, error = %e, "Could not remove orphaned upload");
        }
    }
}
