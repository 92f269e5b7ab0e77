//! Preview Server
//!
//! Hands generated documents from producers to viewers, resolves their
//! content lazily and exports PDFs as page-image bundles.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use preview_server::config::Config;
use preview_server::db;
use preview_server::platform::HttpPlatform;
use preview_server::preview::{MemorySessionStorage, SessionStorage, SqliteSessionStorage};
use preview_server::routes;
use preview_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "preview_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Preview Server v{}", env!("CARGO_PKG_VERSION"));

    // Initialize session storage
    let storage: Arc<dyn SessionStorage> = match db::create_pool(&config.database.url).await {
        Ok(pool) => {
            tracing::info!("Database initialized at {}", config.database.url);
            Arc::new(SqliteSessionStorage::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to open database {}: {}. Sessions will not survive a restart",
                config.database.url,
                e
            );
            Arc::new(MemorySessionStorage::new())
        }
    };

    // Initialize platform
    let mut platform = HttpPlatform::new(config.platform.fetch_timeout())
        .context("Failed to build HTTP client")?;
    if let Some(raw) = &config.platform.api_base_url {
        let base_url: reqwest::Url = raw.parse().with_context(|| format!("Invalid API_BASE_URL: {}", raw))?;
        tracing::info!("Relative locators resolve against {}", raw);
        platform = platform.with_base_url(base_url);
    }
    if let Some(dir) = &config.platform.export_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create export dir {}", dir.display()))?;
        platform = platform.with_export_dir(dir.clone());
        tracing::info!("Downloads are also written to {}", dir.display());
    }

    // Create application state
    let app_state = AppState::new(config.clone(), storage, Arc::new(platform));

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = routes::router(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    tracing::info!("Preview Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    app_state.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
