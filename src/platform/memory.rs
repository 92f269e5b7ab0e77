//! In-memory platform for tests
//!
//! Serves registered locators from a map, counts fetches per locator and
//! records every delivered download.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{Download, EphemeralHandle, FetchedResource, HandleRegistry, PlatformIo};
use crate::preview::{PreviewError, PreviewResult};

#[derive(Default)]
pub struct MemoryPlatform {
    resources: Mutex<HashMap<String, FetchedResource>>,
    fetch_counts: Mutex<HashMap<String, usize>>,
    downloads: Mutex<Vec<Download>>,
    handles: HandleRegistry,
    fetch_delay: Option<Duration>,
}

impl MemoryPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Platform whose fetches, handle reads included, take `delay` to complete
    pub fn with_fetch_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fetch_delay: Some(delay),
            ..Self::default()
        })
    }

    /// Serve `bytes` at `locator`
    pub fn serve(&self, locator: &str, bytes: impl Into<Bytes>, content_type: &str) {
        self.resources.lock().insert(
            locator.to_string(),
            FetchedResource {
                bytes: bytes.into(),
                content_type: Some(content_type.to_string()),
            },
        );
    }

    /// How many times `locator` was fetched
    pub fn fetch_count(&self, locator: &str) -> usize {
        self.fetch_counts.lock().get(locator).copied().unwrap_or(0)
    }

    pub fn downloads(&self) -> Vec<Download> {
        self.downloads.lock().clone()
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }
}

#[async_trait]
impl PlatformIo for MemoryPlatform {
    async fn fetch_bytes(&self, locator: &str) -> PreviewResult<FetchedResource> {
        *self.fetch_counts.lock().entry(locator.to_string()).or_default() += 1;

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        if HandleRegistry::is_handle(locator) {
            return self.handles.get(locator).ok_or_else(|| PreviewError::FetchFailure {
                locator: locator.to_string(),
                message: "reference was released".to_string(),
            });
        }

        self.resources
            .lock()
            .get(locator)
            .cloned()
            .ok_or_else(|| PreviewError::FetchFailure {
                locator: locator.to_string(),
                message: "server answered 404".to_string(),
            })
    }

    fn mint_reference(&self, bytes: Bytes, content_type: &str) -> EphemeralHandle {
        self.handles.mint(bytes, content_type)
    }

    fn release_reference(&self, handle: &EphemeralHandle) -> bool {
        self.handles.revoke(handle)
    }

    async fn trigger_download(&self, download: &Download) -> PreviewResult<()> {
        self.downloads.lock().push(download.clone());
        Ok(())
    }
}
