//! Viewer Routes
//!
//! The navigation route mounts a viewer; everything else drives a mounted
//! viewer by id.
//!
//! Endpoints:
//! - GET <viewer route>?session=<id> - Mount a viewer
//! - GET /api/v1/viewers/:viewer_id - Snapshot
//! - PUT /api/v1/viewers/:viewer_id/selection - Select a document
//! - POST /api/v1/viewers/:viewer_id/reload - Mount again
//! - DELETE /api/v1/viewers/:viewer_id/notice - Dismiss the notice
//! - GET /api/v1/viewers/:viewer_id/content - Current document, inline
//! - GET /api/v1/viewers/:viewer_id/download/pdf - Current document as PDF
//! - GET /api/v1/viewers/:viewer_id/download/images - Page images
//! - DELETE /api/v1/viewers/:viewer_id - Dispose

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::platform::Download;
use crate::preview::naming::{base_name, sanitize_file_name, DEFAULT_SANITIZED_NAME};
use crate::preview::{PreviewError, ViewerSnapshot};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MountQuery {
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountedViewer {
    pub viewer_id: Uuid,
    #[serde(flatten)]
    pub snapshot: ViewerSnapshot,
}

// ============================================================================
// Router
// ============================================================================

/// Create the viewers router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:viewer_id", get(get_viewer).delete(dispose_viewer))
        .route("/:viewer_id/selection", put(select_document))
        .route("/:viewer_id/reload", post(reload_viewer))
        .route("/:viewer_id/notice", delete(dismiss_notice))
        .route("/:viewer_id/content", get(get_content))
        .route("/:viewer_id/download/pdf", get(download_pdf))
        .route("/:viewer_id/download/images", get(download_images))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET <viewer route>?session=<id>
///
/// Always mounts; a missing or unknown session yields a viewer in the
/// error state.
pub async fn mount_viewer(
    State(state): State<AppState>,
    Query(query): Query<MountQuery>,
) -> (StatusCode, Json<MountedViewer>) {
    let (viewer_id, snapshot) = state.viewers().mount(query.session.as_deref()).await;
    (StatusCode::CREATED, Json(MountedViewer { viewer_id, snapshot }))
}

/// GET /api/v1/viewers/:viewer_id
async fn get_viewer(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<Json<ViewerSnapshot>> {
    let viewer = state.viewers().get(&viewer_id).await?;
    let snapshot = viewer.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// PUT /api/v1/viewers/:viewer_id/selection
///
/// Rejected selections are errors; a failed resolution of an accepted one is
/// reported through the snapshot notice.
async fn select_document(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
    Json(request): Json<SelectionRequest>,
) -> Result<Json<ViewerSnapshot>> {
    let viewer = state.viewers().get(&viewer_id).await?;
    let mut viewer = viewer.lock().await;

    match viewer.select(request.index).await {
        Err(e @ (PreviewError::NotReady | PreviewError::IndexOutOfRange { .. })) => Err(e.into()),
        _ => Ok(Json(viewer.snapshot())),
    }
}

/// POST /api/v1/viewers/:viewer_id/reload
async fn reload_viewer(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<Json<ViewerSnapshot>> {
    let viewer = state.viewers().get(&viewer_id).await?;
    let mut viewer = viewer.lock().await;

    if let Err(e) = viewer.reload().await {
        tracing::debug!(viewer_id = %viewer_id, error = %e, "Reload finished with error");
    }
    Ok(Json(viewer.snapshot()))
}

/// DELETE /api/v1/viewers/:viewer_id/notice
async fn dismiss_notice(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<Json<ViewerSnapshot>> {
    let viewer = state.viewers().get(&viewer_id).await?;
    let mut viewer = viewer.lock().await;
    viewer.dismiss_notice();
    Ok(Json(viewer.snapshot()))
}

/// GET /api/v1/viewers/:viewer_id/content
async fn get_content(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<Response> {
    let viewer = state.viewers().get(&viewer_id).await?;
    let (doc, bytes) = viewer.lock().await.current_content().await?;

    file_response(
        Download {
            file_name: doc.file_name,
            content_type: doc.mime_type,
            bytes,
        },
        "inline",
    )
}

/// GET /api/v1/viewers/:viewer_id/download/pdf
async fn download_pdf(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<Response> {
    let viewer = state.viewers().get(&viewer_id).await?;
    let download = viewer.lock().await.download_pdf().await?;
    file_response(download, "attachment")
}

/// GET /api/v1/viewers/:viewer_id/download/images
async fn download_images(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<Response> {
    let download = state.viewers().download_images(&viewer_id).await?;
    file_response(download, "attachment")
}

/// DELETE /api/v1/viewers/:viewer_id
async fn dispose_viewer(
    State(state): State<AppState>,
    Path(viewer_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.viewers().dispose(&viewer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

fn file_response(download: Download, disposition: &str) -> Result<Response> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type.as_str())
        .header(header::CONTENT_LENGTH, download.bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(disposition, &download.file_name),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(download.bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// `Content-Disposition` with an ASCII fallback and the exact UTF-8 name
pub fn content_disposition(disposition: &str, file_name: &str) -> String {
    let base = base_name(file_name);
    let extension = file_name
        .strip_prefix(base)
        .filter(|ext| ext.is_ascii() && !ext.contains('"'))
        .unwrap_or("");
    let fallback = format!("{}{}", sanitize_file_name(base, DEFAULT_SANITIZED_NAME), extension);

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition,
        fallback,
        urlencoding::encode(file_name)
    )
}
