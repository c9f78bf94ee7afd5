// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Upstream proxy configuration
///
/// Timeouts are in seconds and bound every upstream exchange so a slow
/// backend cannot pin a connection indefinitely.
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    pub connect_timeout: u64,
    pub response_timeout: u64,
}

/// Routes configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    /// Index files tried when a document-root path resolves to a directory
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
    /// The route table, matched by longest prefix
    #[serde(default = "default_route_table")]
    pub table: Vec<Route>,
    /// Health check configuration
    #[serde(default)]
    pub health: HealthConfig,
}

fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string(), "index.htm".to_string()]
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            index_files: default_index_files(),
            table: default_route_table(),
            health: HealthConfig::default(),
        }
    }
}

/// A single routing rule: a path prefix and what to do with matching requests
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Route {
    pub prefix: String,
    pub action: RouteAction,
}

/// Route dispositions
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteAction {
    /// Map the prefix onto a filesystem directory (prefix is stripped)
    Alias { dir: String },
    /// Serve under a document root (full path kept); on miss serve the
    /// root-relative fallback file with status 200
    SpaRoot { root: String, fallback: String },
    /// Forward to an upstream authority, preserving path and query
    Proxy { upstream: String },
}

/// The Foodgram deployment route table.
///
/// Admin and REST-framework assets plus user media come from the collected
/// static tree; `/admin/` and `/api/` go to the Django backend; everything
/// else is the built frontend bundle, with deep links falling back to the
/// SPA entry point and API docs deep links to the ReDoc page.
fn default_route_table() -> Vec<Route> {
    vec![
        Route {
            prefix: "/static/admin/".to_string(),
            action: RouteAction::Alias {
                dir: "/var/html/static/admin/".to_string(),
            },
        },
        Route {
            prefix: "/static/rest_framework/".to_string(),
            action: RouteAction::Alias {
                dir: "/var/html/static/rest_framework/".to_string(),
            },
        },
        Route {
            prefix: "/media/".to_string(),
            action: RouteAction::Alias {
                dir: "/var/html/media/".to_string(),
            },
        },
        Route {
            prefix: "/admin/".to_string(),
            action: RouteAction::Proxy {
                upstream: "backend:8000".to_string(),
            },
        },
        Route {
            prefix: "/api/docs/".to_string(),
            action: RouteAction::SpaRoot {
                root: "/usr/share/nginx/html".to_string(),
                fallback: "/api/docs/redoc.html".to_string(),
            },
        },
        Route {
            prefix: "/api/".to_string(),
            action: RouteAction::Proxy {
                upstream: "backend:8000".to_string(),
            },
        },
        Route {
            prefix: "/".to_string(),
            action: RouteAction::SpaRoot {
                root: "/usr/share/nginx/html".to_string(),
                fallback: "/index.html".to_string(),
            },
        },
    ]
}

/// Health check configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}
