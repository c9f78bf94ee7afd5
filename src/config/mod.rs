// Configuration module entry point
// Loads the static route table and runtime settings at process start

mod types;

use std::net::SocketAddr;

// Re-export public types
pub use types::{
    Config, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, ProxyConfig, Route,
    RouteAction, RoutesConfig, ServerConfig,
};

impl Config {
    /// Load configuration from the default "config.toml" location
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// Settings are resolved in order: built-in defaults, then the config
    /// file (optional), then `EDGE_*` environment variables. The built-in
    /// route table is supplied via serde defaults on `RoutesConfig`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("EDGE"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 80)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "foodgram-edge/0.1")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("proxy.connect_timeout", 5)?
            .set_default("proxy.response_timeout", 60)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let cfg = Config::load_from("definitely-not-a-real-config-file").unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 80);
        assert_eq!(cfg.proxy.connect_timeout, 5);
        assert_eq!(cfg.proxy.response_timeout, 60);
        // Route table defaults to the deployment table
        assert_eq!(cfg.routes.table.len(), 7);
        assert_eq!(cfg.routes.table.last().unwrap().prefix, "/");
    }

    #[test]
    fn test_socket_addr_parsing() {
        let mut cfg = Config::load_from("definitely-not-a-real-config-file").unwrap();
        cfg.server.host = "127.0.0.1".to_string();
        cfg.server.port = 8080;
        let addr = cfg.get_socket_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }
}
