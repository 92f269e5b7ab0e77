//! Configuration management for the preview server

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::preview::DEFAULT_VIEWER_ROUTE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub viewer: ViewerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Host capabilities: where relative locators point, how long fetches may
/// take, and where delivered downloads are written
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub api_base_url: Option<String>,
    pub fetch_timeout_secs: u64,
    pub export_dir: Option<PathBuf>,
}

impl PlatformConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    /// Navigation route that mounts a viewer
    pub route: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./previews.db".to_string(),
            },
            platform: PlatformConfig {
                api_base_url: None,
                fetch_timeout_secs: 30,
                export_dir: None,
            },
            viewer: ViewerConfig {
                route: DEFAULT_VIEWER_ROUTE.to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./previews.db".to_string()),
            },
            platform: PlatformConfig {
                api_base_url: non_empty_var("API_BASE_URL"),
                fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                export_dir: non_empty_var("EXPORT_DIR").map(PathBuf::from),
            },
            viewer: ViewerConfig {
                route: viewer_route(non_empty_var("VIEWER_ROUTE")),
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Accept a navigation route the router can register next to the fixed ones
///
/// The route must be an absolute literal path outside `/health` and `/api`.
/// Anything else falls back to [`DEFAULT_VIEWER_ROUTE`].
fn viewer_route(raw: Option<String>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_VIEWER_ROUTE.to_string();
    };
    let route = raw.trim();

    let reserved = route == "/health"
        || route == "/api"
        || route.starts_with("/api/");
    let dynamic = route
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'));

    if !route.starts_with('/') || reserved || dynamic {
        tracing::warn!(
            route = %route,
            fallback = DEFAULT_VIEWER_ROUTE,
            "Ignoring unusable VIEWER_ROUTE"
        );
        return DEFAULT_VIEWER_ROUTE.to_string();
    }
    route.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:./previews.db");
        assert_eq!(config.platform.fetch_timeout(), Duration::from_secs(30));
        assert!(config.platform.export_dir.is_none());
        assert_eq!(config.viewer.route, "/documents/preview");
    }

    #[test]
    fn test_viewer_route_validation() {
        assert_eq!(viewer_route(None), DEFAULT_VIEWER_ROUTE);
        assert_eq!(viewer_route(Some("/recibos/visualizar".to_string())), "/recibos/visualizar");
        assert_eq!(viewer_route(Some(" /preview ".to_string())), "/preview");

        for bad in ["documents/preview", "/health", "/api", "/api/v1/viewers", "/docs/:id", "/docs/*rest"] {
            assert_eq!(viewer_route(Some(bad.to_string())), DEFAULT_VIEWER_ROUTE, "{bad}");
        }
    }
}
