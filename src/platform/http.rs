//! HTTP host platform
//!
//! Fetches remote documents with `reqwest`, keeps ephemeral handles in a
//! [`HandleRegistry`] and, when an export directory is configured, writes
//! every triggered download to disk.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Url};

use super::{Download, EphemeralHandle, FetchedResource, HandleRegistry, PlatformIo};
use crate::preview::naming::{base_name, sanitize_file_name, DEFAULT_SANITIZED_NAME};
use crate::preview::{PreviewError, PreviewResult};

/// Production [`PlatformIo`] implementation
pub struct HttpPlatform {
    client: Client,
    base_url: Option<Url>,
    handles: HandleRegistry,
    export_dir: Option<PathBuf>,
}

impl HttpPlatform {
    /// Create a platform with the given fetch timeout
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: None,
            handles: HandleRegistry::new(),
            export_dir: None,
        })
    }

    /// Resolve relative locators against this base URL
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Also write triggered downloads into this directory
    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = Some(dir);
        self
    }

    fn resolve_url(&self, locator: &str) -> PreviewResult<Url> {
        let parsed = match Url::parse(locator) {
            Ok(url) => Ok(url),
            Err(_) => match &self.base_url {
                Some(base) => base.join(locator),
                None => Url::parse(locator),
            },
        };
        parsed.map_err(|e| PreviewError::FetchFailure {
            locator: locator.to_string(),
            message: format!("invalid locator: {}", e),
        })
    }

    fn export_path(dir: &std::path::Path, file_name: &str) -> PathBuf {
        // Slugified stem keeps names inside the directory
        let base = base_name(file_name);
        let extension = file_name.strip_prefix(base).unwrap_or("");
        let safe = sanitize_file_name(base, DEFAULT_SANITIZED_NAME);
        dir.join(format!("{}{}", safe, extension))
    }
}

#[async_trait]
impl PlatformIo for HttpPlatform {
    async fn fetch_bytes(&self, locator: &str) -> PreviewResult<FetchedResource> {
        if HandleRegistry::is_handle(locator) {
            return self.handles.get(locator).ok_or_else(|| PreviewError::FetchFailure {
                locator: locator.to_string(),
                message: "reference was released".to_string(),
            });
        }

        let url = self.resolve_url(locator)?;
        tracing::debug!(url = %url, "Fetching document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PreviewError::FetchFailure {
                locator: locator.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::FetchFailure {
                locator: locator.to_string(),
                message: format!("server answered {}", status.as_u16()),
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| PreviewError::FetchFailure {
            locator: locator.to_string(),
            message: e.to_string(),
        })?;

        Ok(FetchedResource {
            bytes,
            content_type,
        })
    }

    fn mint_reference(&self, bytes: Bytes, content_type: &str) -> EphemeralHandle {
        self.handles.mint(bytes, content_type)
    }

    fn release_reference(&self, handle: &EphemeralHandle) -> bool {
        self.handles.revoke(handle)
    }

    async fn trigger_download(&self, download: &Download) -> PreviewResult<()> {
        let Some(dir) = &self.export_dir else {
            tracing::debug!(file_name = %download.file_name, "Download delivered to caller");
            return Ok(());
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PreviewError::Internal(format!("Failed to create {}: {}", dir.display(), e)))?;

        let path = Self::export_path(dir, &download.file_name);
        tokio::fs::write(&path, &download.bytes)
            .await
            .map_err(|e| PreviewError::Internal(format!("Failed to write {}: {}", path.display(), e)))?;

        tracing::info!(
            path = %path.display(),
            size = download.bytes.len(),
            "Download written to export directory"
        );
        Ok(())
    }
}
