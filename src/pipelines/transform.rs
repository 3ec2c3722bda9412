// SPDX-License-Identifier: GPL-3.0-only

//! AI transform client
//!
//! Sends a captured frame to a server-side transform and brings the result
//! back as pixels:
//!
//! ```text
//! RGBA frame → downscale (long edge ≤ max) → JPEG → data URL → POST { imageData }
//!                                                                  │
//! RGBA result ← decode ← data URL ← response[field] ◀──────────────┘
//! ```
//!
//! Every failure (network, status, missing field, undecodable payload,
//! timeout) comes back as a [`TransformError`] tagged with the style, so the
//! compositor can fall back to the untransformed frame.

use crate::app::state::AiStyle;
use crate::config::{BackendConfig, TransformConfig};
use crate::errors::{BoothError, BoothResult, TransformError, TransformFailure};
use crate::pipelines::photo::encoding;
use futures::future::BoxFuture;
use image::RgbaImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request body sent to every transform endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// `data:image/jpeg;base64,...`
    pub image_data: String,
}

/// Something that can run a transform and answer with a JSON object
pub trait TransformEndpoint: Send + Sync {
    fn invoke<'a>(
        &'a self,
        style: AiStyle,
        request: &'a TransformRequest,
    ) -> BoxFuture<'a, Result<serde_json::Value, TransformFailure>>;
}

/// Transform functions reached over HTTP
pub struct HttpTransformEndpoint {
    client: reqwest::Client,
    api_key: String,
    stylize_url: String,
    deage_url: String,
}

impl HttpTransformEndpoint {
    pub fn new(backend: &BackendConfig, transform: &TransformConfig) -> BoothResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BoothError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: backend.api_key.clone(),
            stylize_url: resolve_url(&backend.url, &transform.stylize_endpoint)?,
            deage_url: resolve_url(&backend.url, &transform.deage_endpoint)?,
        })
    }

    fn url_for(&self, style: AiStyle) -> &str {
        match style {
            AiStyle::Stylize => &self.stylize_url,
            AiStyle::DeAge => &self.deage_url,
        }
    }
}

/// Absolute endpoints are used as-is, relative ones hang off the backend URL
fn resolve_url(base: &str, endpoint: &str) -> BoothResult<String> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }
    if base.is_empty() {
        return Err(BoothError::Config(format!(
            "transform endpoint '{}' is relative but no backend URL is configured",
            endpoint
        )));
    }
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

impl TransformEndpoint for HttpTransformEndpoint {
    fn invoke<'a>(
        &'a self,
        style: AiStyle,
        request: &'a TransformRequest,
    ) -> BoxFuture<'a, Result<serde_json::Value, TransformFailure>> {
        Box::pin(async move {
            let url = self.url_for(style);
            debug!(url, %style, "Invoking transform");

            let mut builder = self.client.post(url).json(request);
            if !self.api_key.is_empty() {
                builder = builder
                    .header("apikey", &self.api_key)
                    .bearer_auth(&self.api_key);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| TransformFailure::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransformFailure::Status(status.as_u16()));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| TransformFailure::Decode(format!("response is not JSON: {}", e)))
        })
    }
}

/// Client used by the compositor for AI filters
pub struct TransformClient {
    endpoint: Arc<dyn TransformEndpoint>,
    config: TransformConfig,
}

impl TransformClient {
    pub fn new(endpoint: Arc<dyn TransformEndpoint>, config: TransformConfig) -> Self {
        Self { endpoint, config }
    }

    /// HTTP client for the configured endpoints, or None when they cannot be reached
    pub fn from_config(backend: &BackendConfig, transform: &TransformConfig) -> Option<Self> {
        match HttpTransformEndpoint::new(backend, transform) {
            Ok(endpoint) => Some(Self::new(Arc::new(endpoint), transform.clone())),
            Err(e) => {
                warn!(error = %e, "AI filters unavailable");
                None
            }
        }
    }

    /// Response field carrying the result for `style`
    pub fn field_for(&self, style: AiStyle) -> &str {
        match style {
            AiStyle::Stylize => &self.config.stylize_field,
            AiStyle::DeAge => &self.config.deage_field,
        }
    }

    /// Run `style` on `frame`
    ///
    /// The result may have any size; callers scale it to their surface.
    pub async fn transform(
        &self,
        frame: RgbaImage,
        style: AiStyle,
    ) -> Result<RgbaImage, TransformError> {
        let timeout = self.config.timeout();
        let (w, h) = frame.dimensions();

        match tokio::time::timeout(timeout, self.round_trip(frame, style)).await {
            Ok(Ok(image)) => {
                info!(
                    %style,
                    from = ?(w, h),
                    to = ?image.dimensions(),
                    "AI transform complete"
                );
                Ok(image)
            }
            Ok(Err(kind)) => Err(TransformError::new(style, kind)),
            Err(_) => Err(TransformError::new(style, TransformFailure::Timeout(timeout))),
        }
    }

    async fn round_trip(
        &self,
        frame: RgbaImage,
        style: AiStyle,
    ) -> Result<RgbaImage, TransformFailure> {
        let max_dimension = self.config.max_dimension;
        let quality = self.config.jpeg_quality;

        let image_data =
            tokio::task::spawn_blocking(move || prepare_payload(&frame, max_dimension, quality))
                .await
                .map_err(|e| TransformFailure::Encode(format!("encode task error: {}", e)))??;

        let request = TransformRequest { image_data };
        let response = self.endpoint.invoke(style, &request).await?;

        let field = self.field_for(style);
        let data_url = response
            .get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TransformFailure::MissingField(field.to_string()))?
            .to_string();

        tokio::task::spawn_blocking(move || decode_result(&data_url))
            .await
            .map_err(|e| TransformFailure::Decode(format!("decode task error: {}", e)))?
    }
}

/// Downscale so the long edge is at most `max_dimension`, encode as JPEG data URL
pub fn prepare_payload(
    frame: &RgbaImage,
    max_dimension: u32,
    quality: u8,
) -> Result<String, TransformFailure> {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return Err(TransformFailure::Encode("frame has no pixels".into()));
    }

    let long_edge = w.max(h);
    let jpeg = if max_dimension > 0 && long_edge > max_dimension {
        let scale = max_dimension as f64 / long_edge as f64;
        let nw = ((w as f64 * scale).round() as u32).clamp(1, max_dimension);
        let nh = ((h as f64 * scale).round() as u32).clamp(1, max_dimension);
        let scaled = image::imageops::resize(frame, nw, nh, FilterType::Triangle);
        debug!(from = ?(w, h), to = ?(nw, nh), "Downscaled transform payload");
        encoding::encode_jpeg(&scaled, quality)
    } else {
        encoding::encode_jpeg(frame, quality)
    }
    .map_err(TransformFailure::Encode)?;

    Ok(encoding::to_data_url(&jpeg, "image/jpeg"))
}

fn decode_result(data_url: &str) -> Result<RgbaImage, TransformFailure> {
    let (_, bytes) = encoding::parse_data_url(data_url).map_err(TransformFailure::Decode)?;
    encoding::decode_rgba(&bytes).map_err(TransformFailure::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_payload_is_downscaled() {
        let frame = RgbaImage::from_pixel(2048, 1536, Rgba([10, 20, 30, 255]));
        let url = prepare_payload(&frame, 1024, 85).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let image = decode_result(&url).unwrap();
        assert_eq!(image.dimensions(), (1024, 768));
    }

    #[test]
    fn test_small_payload_keeps_size() {
        let frame = RgbaImage::from_pixel(320, 240, Rgba([10, 20, 30, 255]));
        let url = prepare_payload(&frame, 1024, 85).unwrap();
        assert_eq!(decode_result(&url).unwrap().dimensions(), (320, 240));
    }

    #[test]
    fn test_portrait_long_edge_is_height() {
        let frame = RgbaImage::from_pixel(960, 1280, Rgba([0, 0, 0, 255]));
        let url = prepare_payload(&frame, 1024, 85).unwrap();
        assert_eq!(decode_result(&url).unwrap().dimensions(), (768, 1024));
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://x.example/", "/functions/v1/cartoonify").unwrap(),
            "https://x.example/functions/v1/cartoonify"
        );
        assert_eq!(
            resolve_url("", "http://localhost:9000/t").unwrap(),
            "http://localhost:9000/t"
        );
        assert!(resolve_url("", "functions/v1/de-age").is_err());
    }

    #[test]
    fn test_request_field_name() {
        let body = serde_json::to_value(TransformRequest {
            image_data: "data:x".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "imageData": "data:x" }));
    }
}
