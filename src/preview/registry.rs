//! Mounted viewer registry
//!
//! Each navigation to the viewer route mounts a fresh controller under a new
//! viewer id. Requests for the same viewer are serialized by its mutex;
//! different viewers never contend beyond the map lookup. Image exports run
//! outside that mutex so the viewer stays readable while pages render.
//!
//! Viewers leave the map only through [`ViewerRegistry::dispose`] or
//! [`ViewerRegistry::dispose_all`] at shutdown. Every mount registers one,
//! including mounts that end in the error state, so a client that navigates
//! away without disposing leaves its viewer (and its cached bytes) behind
//! until the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::session::PreviewSessionStore;
use super::viewer::{DocumentViewerController, ViewerSnapshot};
use super::{PreviewError, PreviewResult};
use crate::platform::{Download, PlatformIo};

pub type SharedViewer = Arc<Mutex<DocumentViewerController>>;

/// Registry of live viewers
#[derive(Clone)]
pub struct ViewerRegistry {
    sessions: PreviewSessionStore,
    platform: Arc<dyn PlatformIo>,
    viewers: Arc<RwLock<HashMap<Uuid, SharedViewer>>>,
}

impl ViewerRegistry {
    pub fn new(sessions: PreviewSessionStore, platform: Arc<dyn PlatformIo>) -> Self {
        Self {
            sessions,
            platform,
            viewers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mount a viewer for `session_id`
    ///
    /// The viewer is registered even when mounting fails, so the caller can
    /// read its error state and dispose it like any other viewer.
    pub async fn mount(&self, session_id: Option<&str>) -> (Uuid, ViewerSnapshot) {
        let viewer_id = Uuid::new_v4();
        let mut controller = DocumentViewerController::new(self.sessions.clone(), self.platform.clone());

        if let Err(e) = controller.mount(session_id).await {
            tracing::debug!(viewer_id = %viewer_id, error = %e, "Viewer mounted with error");
        }
        let snapshot = controller.snapshot();

        self.viewers
            .write()
            .await
            .insert(viewer_id, Arc::new(Mutex::new(controller)));

        (viewer_id, snapshot)
    }

    pub async fn get(&self, viewer_id: &Uuid) -> PreviewResult<SharedViewer> {
        self.viewers
            .read()
            .await
            .get(viewer_id)
            .cloned()
            .ok_or_else(|| PreviewError::ViewerNotFound(viewer_id.to_string()))
    }

    /// Run an image export for a viewer without holding its lock
    ///
    /// The lock is taken to start the export and again to record its
    /// outcome. In between, readers see `ExportState::Processing`.
    pub async fn download_images(&self, viewer_id: &Uuid) -> PreviewResult<Download> {
        let viewer = self.get(viewer_id).await?;
        let export = viewer.lock().await.begin_image_export().await?;
        let doc_id = export.doc_id().to_string();

        let result = export.run().await;

        let outcome = viewer.lock().await.finish_image_export(&doc_id, result).await;
        outcome
    }

    /// Dispose and forget a viewer
    pub async fn dispose(&self, viewer_id: &Uuid) -> PreviewResult<()> {
        let viewer = self
            .viewers
            .write()
            .await
            .remove(viewer_id)
            .ok_or_else(|| PreviewError::ViewerNotFound(viewer_id.to_string()))?;

        viewer.lock().await.dispose().await;
        Ok(())
    }

    /// Dispose every viewer. Returns how many were disposed.
    pub async fn dispose_all(&self) -> usize {
        let viewers: Vec<SharedViewer> = self.viewers.write().await.drain().map(|(_, v)| v).collect();
        for viewer in &viewers {
            viewer.lock().await.dispose().await;
        }
        viewers.len()
    }

    pub async fn len(&self) -> usize {
        self.viewers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.viewers.read().await.is_empty()
    }
}
