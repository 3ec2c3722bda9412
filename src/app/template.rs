// SPDX-License-Identifier: GPL-3.0-only

//! Template resolver
//!
//! Keeps the best-known overlay configuration and follows changes pushed by
//! the settings source:
//!
//! ```text
//! SettingsSource::changes() ──▶ watcher task ──▶ refresh() ──▶ listeners
//!                                                   │
//!                  get_active() ◀── current config ─┘
//! ```
//!
//! Overlay bytes are always fetched and decoded here; the compositor only
//! ever sees decoded pixels.

use crate::backends::remote::{BoothSettings, ImageFetcher, SettingsSource, TemplateRecord};
use crate::constants;
use crate::errors::{BoothResult, TemplateLoadError};
use crate::pipelines::photo::{OverlayLayer, encoding};
use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Overlay configuration used for the next capture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateConfig {
    /// Overlay image; `None` means caption mode
    pub overlay_url: Option<String>,
    pub event_name: Option<String>,
    pub caption: Option<String>,
    pub watermark: Option<String>,
    /// Last update of the row the overlay came from
    pub version: Option<DateTime<Utc>>,
}

impl TemplateConfig {
    /// Resolve the active overlay from the settings row and template rows
    ///
    /// The most recently updated active template wins, then the settings
    /// row's own overlay URL, then caption mode.
    pub fn from_rows(settings: &BoothSettings, templates: &[TemplateRecord]) -> Self {
        let active = templates
            .iter()
            .filter(|t| t.active && !t.image_url.is_empty())
            .max_by_key(|t| t.updated_at);

        let (overlay_url, version) = match active {
            Some(t) => (Some(t.image_url.clone()), t.updated_at),
            None => match settings.template_image_url.as_deref() {
                Some(url) if !url.trim().is_empty() => {
                    (Some(url.trim().to_string()), settings.updated_at)
                }
                _ => (None, settings.updated_at),
            },
        };

        Self {
            overlay_url,
            event_name: non_empty(&settings.event_name),
            caption: non_empty(&settings.caption),
            watermark: non_empty(&settings.watermark),
            version,
        }
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay_url.is_some()
    }

    /// Overlay URL with a version token so a replaced image is never served stale
    pub fn fetch_url(&self) -> Option<String> {
        let url = self.overlay_url.as_ref()?;
        let Some(version) = self.version else {
            return Some(url.clone());
        };
        let separator = if url.contains('?') { '&' } else { '?' };
        Some(format!(
            "{}{}v={}",
            url,
            separator,
            version.timestamp_millis()
        ))
    }

    /// Caption drawn in text mode
    pub fn caption_line(&self) -> String {
        match (&self.caption, &self.event_name) {
            (Some(caption), _) => caption.clone(),
            (None, Some(event)) => format!("{} - {}", constants::caption::DEFAULT_CAPTION, event),
            (None, None) => constants::caption::DEFAULT_CAPTION.to_string(),
        }
    }

    /// Watermark drawn in text mode
    pub fn watermark_line(&self) -> String {
        self.watermark
            .clone()
            .or_else(|| self.event_name.clone())
            .unwrap_or_default()
    }

    pub fn text_layer(&self) -> OverlayLayer {
        OverlayLayer::Captions {
            caption: self.caption_line(),
            watermark: self.watermark_line(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

type Listener = Arc<dyn Fn(&TemplateConfig) + Send + Sync>;

struct ResolverInner {
    source: Arc<dyn SettingsSource>,
    fetcher: Arc<dyn ImageFetcher>,
    current: watch::Sender<TemplateConfig>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    /// Last decoded overlay, keyed by fetch URL
    cache: tokio::sync::Mutex<Option<(String, Arc<RgbaImage>)>>,
}

impl ResolverInner {
    async fn refresh(&self) -> BoothResult<TemplateConfig> {
        let settings = self.source.fetch_settings().await?;
        let templates = self.source.fetch_templates().await?;
        let config = TemplateConfig::from_rows(&settings, &templates);

        let changed = self.current.send_if_modified(|current| {
            if *current == config {
                false
            } else {
                *current = config.clone();
                true
            }
        });

        if changed {
            info!(
                overlay = config.overlay_url.as_deref().unwrap_or("none"),
                "Template configuration changed"
            );
            let listeners: Vec<Listener> = self
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .map(|(_, l)| l.clone())
                .collect();
            for listener in listeners {
                listener(&config);
            }
        }
        Ok(config)
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(lid, _)| *lid != id);
    }
}

/// Registration returned by [`TemplateResolver::subscribe`]; dropping it unsubscribes
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct TemplateSubscription {
    id: u64,
    inner: Weak<ResolverInner>,
}

impl TemplateSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for TemplateSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe(self.id);
        }
    }
}

/// Active template configuration with change tracking
pub struct TemplateResolver {
    inner: Arc<ResolverInner>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl TemplateResolver {
    /// Load the current configuration and start following changes
    ///
    /// A failed initial load is logged and leaves caption mode active until
    /// the next change notification or [`refresh`](Self::refresh).
    pub async fn connect(
        source: Arc<dyn SettingsSource>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        // Subscribe before the first fetch so no change is missed in between
        let changes = source.changes();
        let (current, _) = watch::channel(TemplateConfig::default());

        let inner = Arc::new(ResolverInner {
            source,
            fetcher,
            current,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            cache: tokio::sync::Mutex::new(None),
        });

        if let Err(e) = inner.refresh().await {
            warn!(error = %e, "Could not load template configuration, using captions");
        }

        let watcher = tokio::spawn(watch_changes(Arc::downgrade(&inner), changes));

        Self {
            inner,
            watcher: Mutex::new(Some(watcher)),
        }
    }

    /// Best-known configuration
    pub fn get_active(&self) -> TemplateConfig {
        self.inner.current.borrow().clone()
    }

    /// Receiver that observes every configuration change
    pub fn watch(&self) -> watch::Receiver<TemplateConfig> {
        self.inner.current.subscribe()
    }

    /// Re-read the rows now
    pub async fn refresh(&self) -> BoothResult<TemplateConfig> {
        self.inner.refresh().await
    }

    /// Call `on_change` with every new configuration until the returned
    /// subscription is dropped
    pub fn subscribe<F>(&self, on_change: F) -> TemplateSubscription
    where
        F: Fn(&TemplateConfig) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(on_change)));
        TemplateSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Overlay layer for `config`
    ///
    /// Fetch or decode failures come back as [`OverlayLayer::Unavailable`]
    /// so the capture can go ahead without the overlay.
    pub async fn load_layer(&self, config: &TemplateConfig) -> OverlayLayer {
        let Some(url) = config.fetch_url() else {
            return config.text_layer();
        };

        let mut cache = self.inner.cache.lock().await;
        if let Some((cached_url, image)) = cache.as_ref()
            && *cached_url == url
        {
            debug!(url = %url, "Using cached overlay");
            return OverlayLayer::Image(image.clone());
        }

        match self.fetch_and_decode(&url).await {
            Ok(image) => {
                let image = Arc::new(image);
                *cache = Some((url, image.clone()));
                OverlayLayer::Image(image)
            }
            Err(reason) => {
                warn!(url = %url, reason = %reason, "Template overlay unavailable");
                OverlayLayer::Unavailable(TemplateLoadError { url, reason })
            }
        }
    }

    async fn fetch_and_decode(&self, url: &str) -> Result<RgbaImage, String> {
        let bytes = self
            .inner
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| e.to_string())?;

        tokio::task::spawn_blocking(move || encoding::decode_rgba(&bytes))
            .await
            .map_err(|e| format!("decode task error: {}", e))?
            .map(|image| {
                debug!(size = ?image.dimensions(), "Decoded overlay");
                image
            })
    }

    /// Stop following changes
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
            debug!("Template watcher stopped");
        }
    }
}

impl Drop for TemplateResolver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("active", &*self.inner.current.borrow())
            .finish_non_exhaustive()
    }
}

async fn watch_changes(
    inner: Weak<ResolverInner>,
    mut changes: broadcast::Receiver<crate::backends::remote::SettingsChange>,
) {
    loop {
        let refresh = match changes.recv().await {
            Ok(change) => change.affects_template(),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Change notifications lagged, refreshing");
                true
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !refresh {
            continue;
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        if let Err(e) = inner.refresh().await {
            warn!(error = %e, "Template refresh failed, keeping previous configuration");
        }
    }
    debug!("Template watcher finished");
}
