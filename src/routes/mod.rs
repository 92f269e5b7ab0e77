//! Route modules for the preview server

pub mod health;
pub mod previews;
pub mod viewers;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Assemble every route; layers are added by the caller
pub fn router(state: AppState) -> Router {
    let viewer_route = state.config().viewer.route.clone();

    Router::new()
        .route("/health", get(health::health_check))
        .route(&viewer_route, get(viewers::mount_viewer))
        .nest("/api/v1/previews", previews::router())
        .nest("/api/v1/viewers", viewers::router())
        .with_state(state)
}
