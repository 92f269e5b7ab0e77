//! Document viewer controller
//!
//! One controller backs one mounted viewer. It owns the consumed session,
//! the current selection and a private [`ReferenceCache`].
//!
//! ```text
//!              mount(id)
//!   Loading ─────────────┬──▶ Ready { current_index } ──select──▶ Ready
//!                        └──▶ Error { message }
//! ```
//!
//! Resolution and export failures never leave `Ready`; they surface as a
//! dismissible notice and are returned to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cache::ReferenceCache;
use super::naming::base_name;
use super::session::PreviewSessionStore;
use super::types::{DocumentKind, DocumentPreviewSession, PreviewDocument};
use super::{PreviewError, PreviewResult};
use crate::export::{build_archive, rasterize_pages, to_png};
use crate::platform::{Download, EphemeralHandle, PlatformIo};

/// Shown when a session id is present but nothing usable is stored under it
pub const EXPIRED_SESSION_MESSAGE: &str = "Session missing or expired. Generate the document again.";

// ============================================================================
// States
// ============================================================================

/// Lifecycle of a viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ViewerState {
    Loading,
    #[serde(rename_all = "camelCase")]
    Ready { current_index: usize },
    Error { message: String },
}

/// Resolution outcome of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Resolved,
    Failed { message: String },
}

/// Image-bundle export progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExportState {
    #[default]
    Idle,
    Processing,
    Failed { message: String },
}

/// How the current document is presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderTarget {
    /// Paginated frame
    PdfFrame { handle: EphemeralHandle },
    /// Static bitmap
    Image { handle: EphemeralHandle },
    #[serde(rename_all = "camelCase")]
    DownloadLink {
        handle: EphemeralHandle,
        file_name: String,
    },
}

// ============================================================================
// Snapshot
// ============================================================================

/// Serializable view of a viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSnapshot {
    pub state: ViewerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_target: Option<RenderTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub export: ExportState,
}

/// One document as listed in a snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub kind: DocumentKind,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

// ============================================================================
// Controller
// ============================================================================

/// State machine behind one mounted viewer
pub struct DocumentViewerController {
    sessions: PreviewSessionStore,
    platform: Arc<dyn PlatformIo>,
    cache: ReferenceCache,
    session_id: Option<String>,
    session: Option<DocumentPreviewSession>,
    state: ViewerState,
    statuses: HashMap<String, DocumentStatus>,
    notice: Option<String>,
    export: ExportState,
    disposed: bool,
}

impl DocumentViewerController {
    pub fn new(sessions: PreviewSessionStore, platform: Arc<dyn PlatformIo>) -> Self {
        Self {
            sessions,
            cache: ReferenceCache::new(platform.clone()),
            platform,
            session_id: None,
            session: None,
            state: ViewerState::Loading,
            statuses: HashMap::new(),
            notice: None,
            export: ExportState::Idle,
            disposed: false,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn session(&self) -> Option<&DocumentPreviewSession> {
        self.session.as_ref()
    }

    /// Load a session and resolve its starting document
    ///
    /// Returns the session lookup error, or the resolution error of the
    /// starting document. Either way the viewer state reflects the outcome.
    pub async fn mount(&mut self, session_id: Option<&str>) -> PreviewResult<()> {
        self.state = ViewerState::Loading;
        self.session = None;
        self.statuses.clear();
        self.notice = None;
        self.export = ExportState::Idle;
        self.session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string);

        let Some(id) = self.session_id.clone() else {
            let err = PreviewError::MissingSessionId;
            self.state = ViewerState::Error {
                message: err.to_string(),
            };
            return Err(err);
        };

        let session = match self.sessions.consume(&id).await {
            Some(session) if !session.documents.is_empty() => session,
            _ => {
                tracing::info!(session_id = %id, "Preview session missing or expired");
                self.state = ViewerState::Error {
                    message: EXPIRED_SESSION_MESSAGE.to_string(),
                };
                return Err(PreviewError::SessionNotFound(id));
            }
        };

        let current_index = session.start_index().unwrap_or(0);
        self.statuses = session
            .documents
            .iter()
            .map(|doc| (doc.id.clone(), DocumentStatus::Pending))
            .collect();

        tracing::info!(
            session_id = %id,
            documents = session.documents.len(),
            current_index,
            "Viewer mounted"
        );

        self.session = Some(session);
        self.state = ViewerState::Ready { current_index };
        self.resolve_current().await.map(|_| ())
    }

    /// Select another document and resolve it
    pub async fn select(&mut self, index: usize) -> PreviewResult<()> {
        let count = self.ready_session()?.documents.len();
        if index >= count {
            return Err(PreviewError::IndexOutOfRange { index, count });
        }

        self.state = ViewerState::Ready {
            current_index: index,
        };
        self.resolve_current().await.map(|_| ())
    }

    /// Mount again with the same session id
    pub async fn reload(&mut self) -> PreviewResult<()> {
        let session_id = self.session_id.clone();
        self.mount(session_id.as_deref()).await
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Presentation of the current document; `None` until it is resolved
    pub fn render_target(&self) -> Option<RenderTarget> {
        let doc = self.current_document().ok()?;
        if self.statuses.get(&doc.id) != Some(&DocumentStatus::Resolved) {
            return None;
        }
        let handle = self.cache.handle(&doc.id)?;

        Some(match doc.kind {
            DocumentKind::Pdf => RenderTarget::PdfFrame { handle },
            DocumentKind::Image => RenderTarget::Image { handle },
            DocumentKind::Other => RenderTarget::DownloadLink {
                handle,
                file_name: doc.file_name.clone(),
            },
        })
    }

    /// Current document and its bytes
    pub async fn current_content(&mut self) -> PreviewResult<(PreviewDocument, Bytes)> {
        let doc = self.current_document()?.clone();
        match self.cache.bytes(&doc).await {
            Ok(bytes) => {
                self.statuses.insert(doc.id.clone(), DocumentStatus::Resolved);
                Ok((doc, bytes))
            }
            Err(e) => Err(self.record_failure(&doc.id, e)),
        }
    }

    /// Deliver the current document as a PDF file
    pub async fn download_pdf(&mut self) -> PreviewResult<Download> {
        let (doc, bytes) = self.current_content().await?;

        let file_name = if doc.file_name.to_lowercase().contains(".pdf") {
            doc.file_name.clone()
        } else {
            format!("{}.pdf", base_name(&doc.file_name))
        };

        let download = Download {
            file_name,
            content_type: "application/pdf".to_string(),
            bytes,
        };
        self.deliver(download).await
    }

    /// Deliver the current document as images
    ///
    /// PDFs become a zip of per-page PNGs, images a single PNG, anything
    /// else is delivered unchanged. Callers sharing the viewer behind a lock
    /// should drive [`begin_image_export`](Self::begin_image_export) and
    /// [`finish_image_export`](Self::finish_image_export) themselves so the
    /// export runs unlocked.
    pub async fn download_images(&mut self) -> PreviewResult<Download> {
        let export = self.begin_image_export().await?;
        let doc_id = export.doc_id().to_string();
        let result = export.run().await;
        self.finish_image_export(&doc_id, result).await
    }

    /// Take the current document out for export and mark it `Processing`
    pub async fn begin_image_export(&mut self) -> PreviewResult<ImageExport> {
        if self.export == ExportState::Processing {
            return Err(PreviewError::ExportInProgress);
        }
        let (doc, bytes) = self.current_content().await?;
        self.export = ExportState::Processing;
        tracing::debug!(doc_id = %doc.id, kind = ?doc.kind, "Image export started");
        Ok(ImageExport { doc, bytes })
    }

    /// Record the outcome of an export and deliver it on success
    pub async fn finish_image_export(
        &mut self,
        doc_id: &str,
        result: PreviewResult<Download>,
    ) -> PreviewResult<Download> {
        match result {
            Ok(download) => {
                self.export = ExportState::Idle;
                self.deliver(download).await
            }
            Err(e) => {
                tracing::error!(doc_id = %doc_id, error = %e, "Image export failed");
                self.export = ExportState::Failed {
                    message: e.to_string(),
                };
                self.notice = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Release every handle and clear the session. Idempotent.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let released = self.cache.release_all();
        if let Some(id) = &self.session_id {
            self.sessions.clear(id).await;
        }

        tracing::info!(
            session_id = self.session_id.as_deref().unwrap_or("-"),
            released,
            "Viewer disposed"
        );
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        let documents = self
            .session
            .as_ref()
            .map(|session| {
                session
                    .documents
                    .iter()
                    .map(|doc| DocumentEntry {
                        id: doc.id.clone(),
                        title: doc.title.clone(),
                        file_name: doc.file_name.clone(),
                        mime_type: doc.mime_type.clone(),
                        kind: doc.kind,
                        status: self
                            .statuses
                            .get(&doc.id)
                            .cloned()
                            .unwrap_or(DocumentStatus::Pending),
                    })
                    .collect()
            })
            .unwrap_or_default();

        ViewerSnapshot {
            state: self.state.clone(),
            session_id: self.session_id.clone(),
            context: self.session.as_ref().map(|s| s.context.clone()),
            created_at: self.session.as_ref().map(|s| s.created_at),
            documents,
            render_target: self.render_target(),
            notice: self.notice.clone(),
            export: self.export.clone(),
        }
    }

    fn ready_session(&self) -> PreviewResult<&DocumentPreviewSession> {
        match (&self.state, &self.session) {
            (ViewerState::Ready { .. }, Some(session)) => Ok(session),
            _ => Err(PreviewError::NotReady),
        }
    }

    fn current_document(&self) -> PreviewResult<&PreviewDocument> {
        let session = self.ready_session()?;
        let ViewerState::Ready { current_index } = self.state else {
            return Err(PreviewError::NotReady);
        };
        session.documents.get(current_index).ok_or(PreviewError::IndexOutOfRange {
            index: current_index,
            count: session.documents.len(),
        })
    }

    async fn resolve_current(&mut self) -> PreviewResult<EphemeralHandle> {
        let doc = self.current_document()?.clone();
        match self.cache.resolve(&doc).await {
            Ok(handle) => {
                tracing::debug!(doc_id = %doc.id, handle = %handle, "Document resolved");
                self.statuses.insert(doc.id, DocumentStatus::Resolved);
                Ok(handle)
            }
            Err(e) => Err(self.record_failure(&doc.id, e)),
        }
    }

    fn record_failure(&mut self, doc_id: &str, err: PreviewError) -> PreviewError {
        tracing::warn!(doc_id = %doc_id, error = %err, "Document resolution failed");
        self.statuses.insert(
            doc_id.to_string(),
            DocumentStatus::Failed {
                message: err.to_string(),
            },
        );
        self.notice = Some(err.to_string());
        err
    }

    async fn deliver(&mut self, download: Download) -> PreviewResult<Download> {
        if let Err(e) = self.platform.trigger_download(&download).await {
            self.notice = Some(e.to_string());
            return Err(e);
        }
        tracing::debug!(file_name = %download.file_name, size = download.bytes.len(), "Download delivered");
        Ok(download)
    }
}

// ============================================================================
// Image export
// ============================================================================

/// A document taken out of a viewer for image export
///
/// Holds its own copy of the bytes, so running it needs no access to the
/// viewer that produced it.
pub struct ImageExport {
    doc: PreviewDocument,
    bytes: Bytes,
}

impl ImageExport {
    pub fn doc_id(&self) -> &str {
        &self.doc.id
    }

    /// Render the export into a download
    pub async fn run(self) -> PreviewResult<Download> {
        let Self { doc, bytes } = self;
        let base = base_name(&doc.file_name).to_string();

        match doc.kind {
            DocumentKind::Image => {
                let mime_type = doc.mime_type.clone();
                let original = bytes.clone();
                let converted = tokio::task::spawn_blocking(move || to_png(bytes, &mime_type))
                    .await
                    .map_err(|e| PreviewError::Internal(format!("Task join error: {}", e)))?;

                Ok(match converted {
                    Ok(png) => Download {
                        file_name: format!("{}.png", base),
                        content_type: "image/png".to_string(),
                        bytes: png,
                    },
                    Err(e) => {
                        tracing::warn!(
                            doc_id = %doc.id,
                            mime_type = %doc.mime_type,
                            error = %e,
                            "Image not transcodable; delivering original bytes"
                        );
                        Download {
                            file_name: format!("{}.png", base),
                            content_type: doc.mime_type.clone(),
                            bytes: original,
                        }
                    }
                })
            }
            DocumentKind::Pdf => {
                let archive = build_archive(&base, rasterize_pages(bytes)).await?;
                tracing::info!(
                    doc_id = %doc.id,
                    pages = archive.entries.len(),
                    file_name = %archive.file_name,
                    "Page images exported"
                );
                Ok(Download {
                    file_name: archive.file_name,
                    content_type: "application/zip".to_string(),
                    bytes: archive.bytes,
                })
            }
            DocumentKind::Other => Ok(Download {
                file_name: doc.file_name.clone(),
                content_type: doc.mime_type.clone(),
                bytes,
            }),
        }
    }
}

impl Drop for DocumentViewerController {
    fn drop(&mut self) {
        if !self.disposed && self.session_id.is_some() {
            tracing::warn!(
                session_id = self.session_id.as_deref().unwrap_or("-"),
                handles = self.cache.len(),
                "Viewer dropped without dispose; handles leak"
            );
        }
    }
}
