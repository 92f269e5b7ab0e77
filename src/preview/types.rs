//! Preview session types

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::EphemeralHandle;

/// Default header label for a session
pub const DEFAULT_CONTEXT: &str = "Documentos";

/// Default file name for inputs without one
pub const DEFAULT_FILE_NAME: &str = "documento";

/// Content type assumed when nothing better is known
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

// ============================================================================
// Document Kind
// ============================================================================

/// How a document is rendered and exported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Paginated document shown in a frame, exportable as page images
    Pdf,
    /// Static bitmap
    Image,
    /// Anything else, offered as a raw download
    #[default]
    Other,
}

impl DocumentKind {
    /// Classify a normalized mime type
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.contains("pdf") {
            DocumentKind::Pdf
        } else if mime_type.starts_with("image/") {
            DocumentKind::Image
        } else {
            DocumentKind::Other
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// A document as handed in by a producer
#[derive(Debug, Clone, Default)]
pub struct PreviewDocumentInput {
    pub id: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// In-memory bytes; a handle is minted for them at session creation
    pub content: Option<Bytes>,
    /// Remote locator resolved lazily by the viewer
    pub source_locator: Option<String>,
}

impl PreviewDocumentInput {
    /// Input backed by in-memory bytes
    pub fn from_bytes(file_name: &str, mime_type: &str, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            mime_type: Some(mime_type.to_string()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Input backed by a remote locator
    pub fn from_locator(file_name: &str, mime_type: &str, locator: &str) -> Self {
        Self {
            file_name: Some(file_name.to_string()),
            mime_type: Some(mime_type.to_string()),
            source_locator: Some(locator.to_string()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

/// A document inside a preview session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredDocument")]
pub struct PreviewDocument {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    #[serde(skip)]
    pub kind: DocumentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_handle: Option<EphemeralHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_locator: Option<String>,
}

impl PreviewDocument {
    pub fn new(
        id: String,
        title: String,
        file_name: String,
        mime_type: String,
        content_handle: Option<EphemeralHandle>,
        source_locator: Option<String>,
    ) -> Self {
        let kind = DocumentKind::from_mime(&mime_type);
        Self {
            id,
            title,
            file_name,
            mime_type,
            kind,
            content_handle,
            source_locator,
        }
    }
}

/// Wire shape of a stored document; the kind is derived on load
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    id: String,
    title: String,
    file_name: String,
    mime_type: String,
    #[serde(default)]
    content_handle: Option<EphemeralHandle>,
    #[serde(default)]
    source_locator: Option<String>,
}

impl From<StoredDocument> for PreviewDocument {
    fn from(stored: StoredDocument) -> Self {
        PreviewDocument::new(
            stored.id,
            stored.title,
            stored.file_name,
            stored.mime_type,
            stored.content_handle,
            stored.source_locator,
        )
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Durable hand-off record between a producer and one viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPreviewSession {
    pub id: String,
    pub context: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub default_index: usize,
    pub documents: Vec<PreviewDocument>,
}

impl DocumentPreviewSession {
    /// `default_index` clamped into the document range
    pub fn start_index(&self) -> Option<usize> {
        if self.documents.is_empty() {
            None
        } else {
            Some(self.default_index.min(self.documents.len() - 1))
        }
    }
}

/// Options for creating a session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub context: Option<String>,
    pub default_index: Option<usize>,
}

/// Result of creating a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    /// Viewer route with the session id as query parameter
    pub target_location: String,
    pub session: DocumentPreviewSession,
    /// False when the durable write failed; the session will not survive a reload
    pub persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(count: usize, default_index: usize) -> DocumentPreviewSession {
        DocumentPreviewSession {
            id: "s1".to_string(),
            context: DEFAULT_CONTEXT.to_string(),
            created_at: Utc::now(),
            default_index,
            documents: (0..count)
                .map(|i| {
                    PreviewDocument::new(
                        format!("doc-{}", i),
                        format!("Doc {}", i),
                        format!("doc-{}.pdf", i),
                        DEFAULT_MIME_TYPE.to_string(),
                        None,
                        Some(format!("/files/{}.pdf", i)),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(DocumentKind::from_mime("application/pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_mime("application/x-pdf"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_mime("image/jpeg"), DocumentKind::Image);
        assert_eq!(DocumentKind::from_mime("text/csv"), DocumentKind::Other);
    }

    #[test]
    fn test_start_index_is_clamped() {
        assert_eq!(session_with(3, 99).start_index(), Some(2));
        assert_eq!(session_with(3, 1).start_index(), Some(1));
        assert_eq!(session_with(0, 0).start_index(), None);
    }

    #[test]
    fn test_kind_is_derived_when_decoding() {
        let json = r#"{
            "id": "s1",
            "context": "Recibos",
            "createdAt": "2026-10-16T12:00:00Z",
            "documents": [
                {"id": "a", "title": "Foto", "fileName": "foto.jpg", "mimeType": "image/jpeg",
                 "contentHandle": "blob:preview/1"}
            ]
        }"#;

        let session: DocumentPreviewSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.default_index, 0);
        let doc = &session.documents[0];
        assert_eq!(doc.kind, DocumentKind::Image);
        assert_eq!(doc.content_handle.as_ref().unwrap().as_str(), "blob:preview/1");
        assert!(doc.source_locator.is_none());
    }

    #[test]
    fn test_serialized_document_uses_camel_case() {
        let doc = PreviewDocument::new(
            "a".to_string(),
            "Recibo".to_string(),
            "recibo.pdf".to_string(),
            DEFAULT_MIME_TYPE.to_string(),
            None,
            Some("/files/a.pdf".to_string()),
        );
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["fileName"], "recibo.pdf");
        assert_eq!(value["sourceLocator"], "/files/a.pdf");
        assert!(value.get("contentHandle").is_none());
        assert!(value.get("kind").is_none());
    }
}
