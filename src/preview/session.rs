//! Preview Session Store
//!
//! Hand-off channel between a producing screen and the viewer:
//! - `create` resolves inputs into documents and persists the session
//! - `consume` reads it back (never fails, never deletes)
//! - `clear` removes it once the viewer is torn down
//!
//! Sessions do not expire. One that is never consumed stays in storage until
//! it is cleared explicitly.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::naming::{ensure_extension, normalize_mime};
use super::storage::SessionStorage;
use super::types::{
    CreatedSession, DocumentPreviewSession, PreviewDocument, PreviewDocumentInput,
    SessionOptions, DEFAULT_CONTEXT, DEFAULT_FILE_NAME, DEFAULT_MIME_TYPE,
};
use super::{PreviewError, PreviewResult};
use crate::platform::PlatformIo;

/// Storage key prefix for sessions
pub const STORAGE_PREFIX: &str = "documentpreview:";

/// Default viewer route
pub const DEFAULT_VIEWER_ROUTE: &str = "/documents/preview";

/// Storage key of a session
pub fn storage_key(session_id: &str) -> String {
    format!("{}{}", STORAGE_PREFIX, session_id)
}

// ============================================================================
// Session Store
// ============================================================================

/// Durable preview session store
#[derive(Clone)]
pub struct PreviewSessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    storage: Arc<dyn SessionStorage>,
    platform: Arc<dyn PlatformIo>,
    viewer_route: String,
}

impl PreviewSessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>, platform: Arc<dyn PlatformIo>) -> Self {
        Self::with_viewer_route(storage, platform, DEFAULT_VIEWER_ROUTE)
    }

    pub fn with_viewer_route(
        storage: Arc<dyn SessionStorage>,
        platform: Arc<dyn PlatformIo>,
        viewer_route: &str,
    ) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                storage,
                platform,
                viewer_route: viewer_route.to_string(),
            }),
        }
    }

    /// Create and persist a session
    ///
    /// In-memory inputs get an ephemeral handle right away so their bytes
    /// outlive the producer; locator-only inputs are resolved by the viewer.
    /// A failed write still returns the session, with `persisted = false`.
    pub async fn create(
        &self,
        documents: Vec<PreviewDocumentInput>,
        options: SessionOptions,
    ) -> PreviewResult<CreatedSession> {
        if documents.is_empty() {
            return Err(PreviewError::EmptySession);
        }

        let documents: Vec<PreviewDocument> = documents
            .into_iter()
            .map(|input| self.resolve_document(input))
            .collect();

        let session_id = Uuid::new_v4().to_string();
        let session = DocumentPreviewSession {
            id: session_id.clone(),
            context: options.context.unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            created_at: Utc::now(),
            default_index: options.default_index.unwrap_or(0),
            documents,
        };

        let persisted = match self.persist(&session).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Could not persist preview session; it will not survive a reload"
                );
                false
            }
        };

        let target_location = format!(
            "{}?session={}",
            self.inner.viewer_route,
            urlencoding::encode(&session_id)
        );

        tracing::info!(
            session_id = %session_id,
            documents = session.documents.len(),
            persisted = persisted,
            "Created preview session"
        );

        Ok(CreatedSession {
            session_id,
            target_location,
            session,
            persisted,
        })
    }

    /// Read a session; `None` when missing or undecodable
    pub async fn consume(&self, session_id: &str) -> Option<DocumentPreviewSession> {
        let raw = match self.inner.storage.get(&storage_key(session_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to read preview session");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to decode preview session");
                None
            }
        }
    }

    /// Remove a session; no-op if absent
    pub async fn clear(&self, session_id: &str) {
        if let Err(e) = self.inner.storage.remove(&storage_key(session_id)).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to clear preview session");
        } else {
            tracing::debug!(session_id = %session_id, "Cleared preview session");
        }
    }

    async fn persist(&self, session: &DocumentPreviewSession) -> PreviewResult<()> {
        let payload = serde_json::to_string(session)
            .map_err(|e| PreviewError::Internal(format!("Failed to encode session: {}", e)))?;
        self.inner
            .storage
            .set(&storage_key(&session.id), &payload)
            .await
    }

    fn resolve_document(&self, input: PreviewDocumentInput) -> PreviewDocument {
        let file_name = input
            .file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        let mime_type = input
            .mime_type
            .as_deref()
            .and_then(normalize_mime)
            .or_else(|| {
                mime_guess::from_path(&file_name)
                    .first()
                    .map(|mime| mime.essence_str().to_string())
            })
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let title = input
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| file_name.clone());

        let content_handle = input
            .content
            .map(|bytes| self.inner.platform.mint_reference(bytes, &mime_type));

        PreviewDocument::new(
            input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            title,
            ensure_extension(&file_name, &mime_type),
            mime_type,
            content_handle,
            input.source_locator,
        )
    }
}
