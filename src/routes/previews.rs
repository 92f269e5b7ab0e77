//! Preview Session Routes
//!
//! Endpoints:
//! - POST /api/v1/previews - Create a session from documents
//! - GET /api/v1/previews/:session_id - Read a stored session
//! - DELETE /api/v1/previews/:session_id - Clear a session

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::preview::{
    CreatedSession, DocumentPreviewSession, PreviewDocumentInput, PreviewError, SessionOptions,
};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreviewRequest {
    pub documents: Vec<DocumentPayload>,
    pub context: Option<String>,
    pub default_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub id: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    /// Inline content, base64 encoded
    pub content_base64: Option<String>,
    pub source_locator: Option<String>,
}

impl DocumentPayload {
    fn into_input(self, position: usize) -> Result<PreviewDocumentInput> {
        let content = self
            .content_base64
            .map(|encoded| {
                STANDARD.decode(encoded.trim()).map_err(|e| {
                    AppError::BadRequest(format!("documents[{}].contentBase64: {}", position, e))
                })
            })
            .transpose()?;

        Ok(PreviewDocumentInput {
            id: self.id,
            title: self.title,
            file_name: self.file_name,
            mime_type: self.mime_type,
            content: content.map(Into::into),
            source_locator: self.source_locator,
        })
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the previews router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_preview))
        .route("/:session_id", get(get_preview).delete(clear_preview))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/previews
async fn create_preview(
    State(state): State<AppState>,
    Json(request): Json<CreatePreviewRequest>,
) -> Result<(StatusCode, Json<CreatedSession>)> {
    let documents = request
        .documents
        .into_iter()
        .enumerate()
        .map(|(position, payload)| payload.into_input(position))
        .collect::<Result<Vec<_>>>()?;

    let created = state
        .sessions()
        .create(
            documents,
            SessionOptions {
                context: request.context,
                default_index: request.default_index,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/previews/:session_id
async fn get_preview(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DocumentPreviewSession>> {
    state
        .sessions()
        .consume(&session_id)
        .await
        .map(Json)
        .ok_or_else(|| PreviewError::SessionNotFound(session_id).into())
}

/// DELETE /api/v1/previews/:session_id
async fn clear_preview(State(state): State<AppState>, Path(session_id): Path<String>) -> StatusCode {
    state.sessions().clear(&session_id).await;
    StatusCode::NO_CONTENT
}
