//! Viewer-owned reference cache
//!
//! Maps a document id to its resolved bytes and the ephemeral handle passed
//! to renderers. One cache belongs to exactly one viewer and is released
//! when that viewer is disposed.
//!
//! # Coalescing
//!
//! Concurrent resolutions of the same document share one in-flight fetch:
//!
//! ```text
//!  resolve(a) ──┐                      ┌──▶ handle
//!               ├──▶ in_flight[a] ─────┤
//!  resolve(a) ──┘   (one fetch+mint)   └──▶ same handle
//! ```
//!
//! Documents that already carry a handle go through the same map while
//! their bytes are pre-warmed. Failed fetches are not cached; the next call
//! fetches again.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::types::PreviewDocument;
use super::{PreviewError, PreviewResult};
use crate::platform::{EphemeralHandle, PlatformIo};

type PendingResolve = Shared<BoxFuture<'static, PreviewResult<EphemeralHandle>>>;

/// Per-viewer cache of resolved documents
#[derive(Clone)]
pub struct ReferenceCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    platform: Arc<dyn PlatformIo>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    blobs: HashMap<String, Bytes>,
    handles: HashMap<String, EphemeralHandle>,
    in_flight: HashMap<String, PendingResolve>,
}

impl ReferenceCache {
    pub fn new(platform: Arc<dyn PlatformIo>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                platform,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Resolve a document to a renderable handle
    pub async fn resolve(&self, doc: &PreviewDocument) -> PreviewResult<EphemeralHandle> {
        if let Some(handle) = &doc.content_handle {
            let pending = {
                let mut state = self.inner.state.lock();
                state
                    .handles
                    .entry(doc.id.clone())
                    .or_insert_with(|| handle.clone());
                if state.blobs.contains_key(&doc.id) {
                    return Ok(handle.clone());
                }
                state
                    .in_flight
                    .entry(doc.id.clone())
                    .or_insert_with(|| {
                        Self::prewarm(self.inner.clone(), doc.id.clone(), handle.clone())
                            .boxed()
                            .shared()
                    })
                    .clone()
            };
            return pending.await;
        }

        let pending = {
            let mut state = self.inner.state.lock();
            if let Some(handle) = state.handles.get(&doc.id) {
                tracing::debug!(doc_id = %doc.id, "Reference cache hit");
                return Ok(handle.clone());
            }

            let Some(locator) = doc.source_locator.clone() else {
                return Err(PreviewError::ResourceUnavailable(doc.title.clone()));
            };

            state
                .in_flight
                .entry(doc.id.clone())
                .or_insert_with(|| {
                    Self::fetch_and_cache(self.inner.clone(), doc.id.clone(), locator)
                        .boxed()
                        .shared()
                })
                .clone()
        };

        pending.await
    }

    /// Raw bytes of a document, resolving it first when needed
    pub async fn bytes(&self, doc: &PreviewDocument) -> PreviewResult<Bytes> {
        if let Some(bytes) = self.cached_bytes(&doc.id) {
            return Ok(bytes);
        }

        let handle = self.resolve(doc).await?;
        if let Some(bytes) = self.cached_bytes(&doc.id) {
            return Ok(bytes);
        }

        // Pre-warm failed earlier; read the handle directly
        let fetched = self.inner.platform.fetch_bytes(handle.as_str()).await?;
        self.inner
            .state
            .lock()
            .blobs
            .insert(doc.id.clone(), fetched.bytes.clone());
        Ok(fetched.bytes)
    }

    /// Cached handle for a document, if resolved
    pub fn handle(&self, doc_id: &str) -> Option<EphemeralHandle> {
        self.inner.state.lock().handles.get(doc_id).cloned()
    }

    pub fn cached_bytes(&self, doc_id: &str) -> Option<Bytes> {
        self.inner.state.lock().blobs.get(doc_id).cloned()
    }

    /// Revoke one document's handle and drop its bytes
    pub fn release(&self, doc_id: &str) -> bool {
        let handle = {
            let mut state = self.inner.state.lock();
            state.blobs.remove(doc_id);
            state.handles.remove(doc_id)
        };
        match handle {
            Some(handle) => {
                self.inner.platform.release_reference(&handle);
                true
            }
            None => false,
        }
    }

    /// Revoke every handle this cache holds. Returns how many were released.
    pub fn release_all(&self) -> usize {
        let handles: Vec<EphemeralHandle> = {
            let mut state = self.inner.state.lock();
            state.blobs.clear();
            state.handles.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            self.inner.platform.release_reference(handle);
        }
        handles.len()
    }

    /// Number of documents holding a handle
    pub fn len(&self) -> usize {
        self.inner.state.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a local handle's bytes into the cache. Always yields the handle;
    /// a failed read only means `bytes` reads the handle again later.
    async fn prewarm(
        inner: Arc<CacheInner>,
        doc_id: String,
        handle: EphemeralHandle,
    ) -> PreviewResult<EphemeralHandle> {
        let fetched = inner.platform.fetch_bytes(handle.as_str()).await;

        let failure = {
            let mut state = inner.state.lock();
            state.in_flight.remove(&doc_id);
            match fetched {
                Ok(fetched) => {
                    state.blobs.entry(doc_id.clone()).or_insert(fetched.bytes);
                    None
                }
                Err(e) => Some(e),
            }
        };
        if let Some(e) = failure {
            tracing::warn!(doc_id = %doc_id, error = %e, "Could not pre-warm document bytes");
        }
        Ok(handle)
    }

    async fn fetch_and_cache(
        inner: Arc<CacheInner>,
        doc_id: String,
        locator: String,
    ) -> PreviewResult<EphemeralHandle> {
        tracing::debug!(doc_id = %doc_id, locator = %locator, "Resolving document");
        let fetched = inner.platform.fetch_bytes(&locator).await;

        let mut state = inner.state.lock();
        state.in_flight.remove(&doc_id);
        let fetched = fetched?;

        let content_type = fetched
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let handle = inner
            .platform
            .mint_reference(fetched.bytes.clone(), content_type);
        state.blobs.insert(doc_id.clone(), fetched.bytes);
        state.handles.insert(doc_id, handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::platform::MemoryPlatform;
    use crate::preview::types::DEFAULT_MIME_TYPE;

    fn remote_doc(id: &str, locator: &str) -> PreviewDocument {
        PreviewDocument::new(
            id.to_string(),
            format!("Doc {}", id),
            format!("{}.pdf", id),
            DEFAULT_MIME_TYPE.to_string(),
            None,
            Some(locator.to_string()),
        )
    }

    #[tokio::test]
    async fn test_remote_document_is_fetched_once() {
        let platform = MemoryPlatform::new();
        platform.serve("/files/a.pdf", b"%PDF-a".to_vec(), "application/pdf");
        let cache = ReferenceCache::new(platform.clone());
        let doc = remote_doc("a", "/files/a.pdf");

        let first = cache.resolve(&doc).await.unwrap();
        let second = cache.resolve(&doc).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.fetch_count("/files/a.pdf"), 1);
        assert_eq!(&cache.bytes(&doc).await.unwrap()[..], b"%PDF-a");
        assert_eq!(platform.fetch_count("/files/a.pdf"), 1);
    }

    #[tokio::test]
    async fn test_local_handle_is_returned_and_prewarmed() {
        let platform = MemoryPlatform::new();
        let handle = platform.mint_reference(Bytes::from_static(b"local"), "application/pdf");
        let cache = ReferenceCache::new(platform.clone());
        let doc = PreviewDocument::new(
            "local".to_string(),
            "Local".to_string(),
            "local.pdf".to_string(),
            DEFAULT_MIME_TYPE.to_string(),
            Some(handle.clone()),
            None,
        );

        assert_eq!(cache.resolve(&doc).await.unwrap(), handle);
        assert_eq!(cache.cached_bytes("local").as_deref(), Some(&b"local"[..]));

        cache.resolve(&doc).await.unwrap();
        assert_eq!(platform.fetch_count(handle.as_str()), 1);
    }

    #[tokio::test]
    async fn test_concurrent_prewarms_share_one_fetch() {
        let platform = MemoryPlatform::with_fetch_delay(Duration::from_millis(20));
        let handle = platform.mint_reference(Bytes::from_static(b"local"), "application/pdf");
        let cache = ReferenceCache::new(platform.clone());
        let doc = PreviewDocument::new(
            "local".to_string(),
            "Local".to_string(),
            "local.pdf".to_string(),
            DEFAULT_MIME_TYPE.to_string(),
            Some(handle.clone()),
            None,
        );

        let (a, b, c) = tokio::join!(cache.resolve(&doc), cache.resolve(&doc), cache.resolve(&doc));

        assert_eq!(a.unwrap(), handle);
        assert_eq!(b.unwrap(), handle);
        assert_eq!(c.unwrap(), handle);
        assert_eq!(platform.fetch_count(handle.as_str()), 1);
        assert_eq!(cache.cached_bytes("local").as_deref(), Some(&b"local"[..]));
    }

    #[tokio::test]
    async fn test_failed_prewarm_still_resolves() {
        let platform = MemoryPlatform::new();
        let handle = platform.mint_reference(Bytes::from_static(b"gone"), "application/pdf");
        platform.release_reference(&handle);
        let cache = ReferenceCache::new(platform.clone());
        let doc = PreviewDocument::new(
            "gone".to_string(),
            "Gone".to_string(),
            "gone.pdf".to_string(),
            DEFAULT_MIME_TYPE.to_string(),
            Some(handle.clone()),
            None,
        );

        assert_eq!(cache.resolve(&doc).await.unwrap(), handle);
        assert!(cache.cached_bytes("gone").is_none());
        assert!(matches!(cache.bytes(&doc).await, Err(PreviewError::FetchFailure { .. })));
    }

    #[tokio::test]
    async fn test_document_without_source_is_unavailable() {
        let cache = ReferenceCache::new(MemoryPlatform::new());
        let doc = PreviewDocument::new(
            "none".to_string(),
            "Orphan".to_string(),
            "orphan.pdf".to_string(),
            DEFAULT_MIME_TYPE.to_string(),
            None,
            None,
        );

        let err = cache.resolve(&doc).await.unwrap_err();
        assert!(matches!(err, PreviewError::ResourceUnavailable(ref title) if title == "Orphan"));
        assert!(matches!(cache.bytes(&doc).await, Err(PreviewError::ResourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let platform = MemoryPlatform::new();
        let cache = ReferenceCache::new(platform.clone());
        let doc = remote_doc("late", "/files/late.pdf");

        let err = cache.resolve(&doc).await.unwrap_err();
        assert!(matches!(err, PreviewError::FetchFailure { .. }));
        assert!(cache.handle("late").is_none());

        platform.serve("/files/late.pdf", b"%PDF".to_vec(), "application/pdf");
        cache.resolve(&doc).await.unwrap();
        assert_eq!(platform.fetch_count("/files/late.pdf"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_share_one_fetch() {
        let platform = MemoryPlatform::with_fetch_delay(Duration::from_millis(50));
        platform.serve("/files/slow.pdf", b"%PDF-slow".to_vec(), "application/pdf");
        let cache = ReferenceCache::new(platform.clone());
        let doc = remote_doc("slow", "/files/slow.pdf");

        let (a, b, c) = tokio::join!(cache.resolve(&doc), cache.resolve(&doc), cache.resolve(&doc));

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
        assert_eq!(platform.fetch_count("/files/slow.pdf"), 1);
        assert_eq!(platform.handles().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_shared_and_retryable() {
        let platform = MemoryPlatform::with_fetch_delay(Duration::from_millis(20));
        let cache = ReferenceCache::new(platform.clone());
        let doc = remote_doc("gone", "/files/gone.pdf");

        let (a, b) = tokio::join!(cache.resolve(&doc), cache.resolve(&doc));
        assert!(a.is_err() && b.is_err());
        assert_eq!(platform.fetch_count("/files/gone.pdf"), 1);

        assert!(cache.resolve(&doc).await.is_err());
        assert_eq!(platform.fetch_count("/files/gone.pdf"), 2);
    }

    #[tokio::test]
    async fn test_different_documents_resolve_independently() {
        let platform = MemoryPlatform::with_fetch_delay(Duration::from_millis(10));
        platform.serve("/files/a.pdf", b"a".to_vec(), "application/pdf");
        platform.serve("/files/b.pdf", b"b".to_vec(), "application/pdf");
        let cache = ReferenceCache::new(platform.clone());

        let doc_a = remote_doc("a", "/files/a.pdf");
        let doc_b = remote_doc("b", "/files/b.pdf");
        let (a, b) = tokio::join!(cache.resolve(&doc_a), cache.resolve(&doc_b));
        assert_ne!(a.unwrap(), b.unwrap());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_release_all_revokes_handles() {
        let platform = MemoryPlatform::new();
        platform.serve("/files/a.pdf", b"a".to_vec(), "application/pdf");
        platform.serve("/files/b.pdf", b"b".to_vec(), "application/pdf");
        let cache = ReferenceCache::new(platform.clone());

        cache.resolve(&remote_doc("a", "/files/a.pdf")).await.unwrap();
        let b = cache.resolve(&remote_doc("b", "/files/b.pdf")).await.unwrap();
        assert_eq!(platform.handles().len(), 2);

        assert!(cache.release("a"));
        assert!(!cache.release("a"));
        assert_eq!(platform.handles().len(), 1);
        assert!(platform.handles().get(b.as_str()).is_some());

        assert_eq!(cache.release_all(), 1);
        assert!(cache.is_empty());
        assert!(cache.cached_bytes("b").is_none());
        assert!(platform.handles().is_empty());
    }
}
