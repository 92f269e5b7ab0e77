//! Ephemeral handle registry
//!
//! In-process equivalent of browser object URLs. Handles stay live until
//! they are explicitly revoked; nothing expires on its own.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{EphemeralHandle, FetchedResource};

/// Scheme prefix of every minted handle
pub const HANDLE_SCHEME: &str = "blob:";

/// Thread-safe map of live handles to their bytes
#[derive(Clone, Default)]
pub struct HandleRegistry {
    entries: Arc<RwLock<HashMap<String, FetchedResource>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a locator uses the handle scheme
    pub fn is_handle(locator: &str) -> bool {
        locator.starts_with(HANDLE_SCHEME)
    }

    /// Register bytes under a fresh handle
    pub fn mint(&self, bytes: Bytes, content_type: &str) -> EphemeralHandle {
        let handle = EphemeralHandle::new(format!("{}preview/{}", HANDLE_SCHEME, Uuid::new_v4()));
        let resource = FetchedResource {
            bytes,
            content_type: Some(content_type.to_string()),
        };
        self.entries.write().insert(handle.as_str().to_string(), resource);
        handle
    }

    /// Dereference a handle
    pub fn get(&self, locator: &str) -> Option<FetchedResource> {
        self.entries.read().get(locator).cloned()
    }

    /// Revoke a handle, dropping its bytes
    pub fn revoke(&self, handle: &EphemeralHandle) -> bool {
        self.entries.write().remove(handle.as_str()).is_some()
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
