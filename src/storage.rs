// SPDX-License-Identifier: MPL-2.0

//! Local file storage for published photos
//!
//! Every published photo is also handed to a [`DownloadSink`] so the guest
//! (or the operator) keeps a local copy. The directory sink writes into the
//! user's download folder by default.

use crate::errors::{BoothError, BoothResult};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default folder for local copies (`~/Downloads/photobooth`, else `~/Pictures/photobooth`)
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::picture_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photobooth")
}

/// Collision-resistant file name: `<prefix>-<unix millis>-<8 hex>.png`
pub fn unique_file_name(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}.png", prefix, millis, &suffix[..8])
}

/// Receives a local copy of every published photo
pub trait DownloadSink: Send + Sync {
    /// Store `data` as `file_name`, returning where it ended up
    fn save<'a>(&'a self, file_name: &'a str, data: Arc<[u8]>)
    -> BoxFuture<'a, BoothResult<PathBuf>>;
}

/// Writes local copies into a directory
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloads {
    fn save<'a>(
        &'a self,
        file_name: &'a str,
        data: Arc<[u8]>,
    ) -> BoxFuture<'a, BoothResult<PathBuf>> {
        Box::pin(async move {
            if file_name.contains(['/', '\\']) {
                return Err(BoothError::Storage(format!(
                    "invalid file name '{}'",
                    file_name
                )));
            }
            tokio::fs::create_dir_all(&self.dir).await?;
            let path = self.dir.join(file_name);
            tokio::fs::write(&path, &data[..]).await?;
            debug!(path = %path.display(), size = data.len(), "Saved local copy");
            Ok(path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_file_name_shape() {
        let a = unique_file_name("photobooth");
        let b = unique_file_name("photobooth");
        assert_ne!(a, b);
        assert!(a.starts_with("photobooth-"));
        assert!(a.ends_with(".png"));
        assert_eq!(a.split('-').count(), 3);
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = std::env::temp_dir().join(format!("photobooth-dl-{}", uuid::Uuid::new_v4()));
        let sink = DirectoryDownloads::new(&dir);
        let path = sink
            .save("a.png", Arc::from(&b"bytes"[..]))
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
        assert!(sink.save("../a.png", Arc::from(&b""[..])).await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
