//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::platform::PlatformIo;
use crate::preview::{PreviewSessionStore, SessionStorage, ViewerRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pub config: Config,
    pub sessions: PreviewSessionStore,
    pub viewers: ViewerRegistry,
}

impl AppState {
    /// Create a new application state
    ///
    /// The session store and every viewer share one platform, so handles
    /// minted at session creation can be dereferenced by the viewers.
    pub fn new(config: Config, storage: Arc<dyn SessionStorage>, platform: Arc<dyn PlatformIo>) -> Self {
        let sessions = PreviewSessionStore::with_viewer_route(storage, platform.clone(), &config.viewer.route);
        let viewers = ViewerRegistry::new(sessions.clone(), platform);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                viewers,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the preview session store
    pub fn sessions(&self) -> &PreviewSessionStore {
        &self.inner.sessions
    }

    /// Get the mounted viewer registry
    pub fn viewers(&self) -> &ViewerRegistry {
        &self.inner.viewers
    }

    /// Dispose every mounted viewer
    ///
    /// Called before the application exits so handles are revoked and
    /// sessions of open viewers are cleared.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");
        let disposed = self.inner.viewers.dispose_all().await;
        tracing::info!(disposed, "Viewers disposed");
    }
}
