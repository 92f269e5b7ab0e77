//! Host platform capabilities
//!
//! Everything the preview pipeline needs from its host is behind
//! [`PlatformIo`]: fetching bytes, minting and releasing ephemeral handles,
//! and delivering downloads. The rest of the crate only depends on this
//! trait, so the same viewer logic runs inside the HTTP service or a batch
//! exporter.
//!
//! ```text
//!   ReferenceCache ──┐
//!   SessionStore ────┼──▶ dyn PlatformIo ──▶ HttpPlatform
//!   Viewer exports ──┘                        ├─ reqwest client
//!                                             ├─ HandleRegistry (blob:)
//!                                             └─ export directory
//! ```

mod handles;
mod http;
#[cfg(test)]
mod memory;

pub use handles::{HandleRegistry, HANDLE_SCHEME};
pub use http::HttpPlatform;
#[cfg(test)]
pub use memory::MemoryPlatform;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::preview::PreviewResult;

/// Short-lived dereferenceable reference to in-memory bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EphemeralHandle(String);

impl EphemeralHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EphemeralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes plus the content-type hint they were served with
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// A file handed to the user
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Host capabilities used by the preview pipeline
#[async_trait]
pub trait PlatformIo: Send + Sync {
    /// Retrieve bytes for a locator (remote URL or ephemeral handle)
    async fn fetch_bytes(&self, locator: &str) -> PreviewResult<FetchedResource>;

    /// Mint an ephemeral handle for in-memory bytes
    fn mint_reference(&self, bytes: Bytes, content_type: &str) -> EphemeralHandle;

    /// Invalidate a handle. Returns false if it was not live.
    fn release_reference(&self, handle: &EphemeralHandle) -> bool;

    /// Hand a file to the user
    async fn trigger_download(&self, download: &Download) -> PreviewResult<()>;
}
