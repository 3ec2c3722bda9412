// SPDX-License-Identifier: GPL-3.0-only

//! Image fetching by URL
//!
//! Overlay images are always fetched as bytes and decoded locally; a URL is
//! never handed to the compositor directly.

use super::{ImageFetcher, RemoteError, RemoteResult};
use crate::errors::{BoothError, BoothResult};
use futures::future::BoxFuture;
use std::path::PathBuf;
use tracing::debug;

/// Fetches `http(s)://` URLs over the network, `file://` URLs and bare paths from disk
#[derive(Debug, Clone)]
pub struct UrlImageFetcher {
    client: reqwest::Client,
}

impl UrlImageFetcher {
    pub fn new() -> BoothResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BoothError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Local path behind a `file://` URL or a bare path
pub fn local_path(url: &str) -> Option<PathBuf> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return None;
    }
    let path = url.strip_prefix("file://").unwrap_or(url);
    // Cache-busting query does not belong to the path
    let path = path.split('?').next().unwrap_or(path);
    Some(PathBuf::from(path))
}

impl ImageFetcher for UrlImageFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>> {
        Box::pin(async move {
            if let Some(path) = local_path(url) {
                debug!(path = %path.display(), "Reading image from disk");
                return Ok(tokio::fs::read(&path).await?);
            }

            debug!(url, "Fetching image");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| RemoteError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(RemoteError::Http {
                    status: status.as_u16(),
                    message: format!("GET {}", url),
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| RemoteError::Network(e.to_string()))?;
            Ok(bytes.to_vec())
        })
    }
}
