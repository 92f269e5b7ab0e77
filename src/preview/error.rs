//! Preview error types
//!
//! Every failure the preview pipeline can surface to a viewer or a producer.
//! The type is `Clone` so a single in-flight resolution can hand the same
//! error to every caller waiting on it.

use thiserror::Error;

/// Preview pipeline error
#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    /// The viewer was opened without a session id
    #[error("No document session was provided.")]
    MissingSessionId,

    /// Session missing, cleared or undecodable
    #[error("Session missing or expired. Generate the document again. ({0})")]
    SessionNotFound(String),

    /// Producer tried to create a session without documents
    #[error("A preview session needs at least one document")]
    EmptySession,

    /// No mounted viewer under this id
    #[error("Viewer not found: {0}")]
    ViewerNotFound(String),

    /// The viewer has no session loaded
    #[error("The viewer has no document loaded")]
    NotReady,

    /// Selection outside the session's documents
    #[error("Document index {index} out of range ({count} documents)")]
    IndexOutOfRange { index: usize, count: usize },

    /// Document has neither a local handle nor a remote locator
    #[error("Document unavailable: {0}")]
    ResourceUnavailable(String),

    /// Network or transport failure while resolving bytes
    #[error("Failed to load document from {locator}: {message}")]
    FetchFailure { locator: String, message: String },

    /// Bytes could not be decoded as a PDF
    #[error("Invalid PDF document: {0}")]
    InvalidDocument(String),

    /// No drawing surface could be obtained for a page
    #[error("Rendering surface unavailable for page {page}: {message}")]
    RenderSurfaceUnavailable { page: usize, message: String },

    /// A page failed while the image archive was being built
    #[error("Image archive aborted after {written} pages: {source}")]
    ArchiveAborted {
        written: usize,
        #[source]
        source: Box<PreviewError>,
    },

    /// An image export for this viewer is still running
    #[error("An image export is already running")]
    ExportInProgress,

    /// Zip writer failure
    #[error("Failed to write image archive: {0}")]
    ArchiveWrite(String),

    /// Image decoding or encoding failure
    #[error("Image error: {0}")]
    Image(String),

    /// Durable session storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for preview operations
pub type PreviewResult<T> = std::result::Result<T, PreviewError>;

impl PreviewError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::MissingSessionId => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::EmptySession => StatusCode::BAD_REQUEST,
            Self::ViewerNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotReady => StatusCode::CONFLICT,
            Self::IndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
            Self::ResourceUnavailable(_) => StatusCode::NOT_FOUND,
            Self::FetchFailure { .. } => StatusCode::BAD_GATEWAY,
            Self::InvalidDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RenderSurfaceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::ArchiveAborted { source, .. } => source.status_code(),
            Self::ExportInProgress => StatusCode::CONFLICT,
            Self::ArchiveWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code for JSON bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingSessionId => "MISSING_SESSION_ID",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::EmptySession => "EMPTY_SESSION",
            Self::ViewerNotFound(_) => "VIEWER_NOT_FOUND",
            Self::NotReady => "NOT_READY",
            Self::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Self::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            Self::FetchFailure { .. } => "FETCH_FAILURE",
            Self::InvalidDocument(_) => "INVALID_DOCUMENT",
            Self::RenderSurfaceUnavailable { .. } => "RENDER_SURFACE_UNAVAILABLE",
            Self::ArchiveAborted { .. } => "ARCHIVE_ABORTED",
            Self::ExportInProgress => "EXPORT_IN_PROGRESS",
            Self::ArchiveWrite(_) => "ARCHIVE_WRITE",
            Self::Image(_) => "IMAGE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sqlx::Error> for PreviewError {
    fn from(err: sqlx::Error) -> Self {
        PreviewError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for PreviewError {
    fn from(err: image::ImageError) -> Self {
        PreviewError::Image(err.to_string())
    }
}

impl From<zip::result::ZipError> for PreviewError {
    fn from(err: zip::result::ZipError) -> Self {
        PreviewError::ArchiveWrite(err.to_string())
    }
}
