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
    pub data: DataConfig,
    pub site: SiteConfig,
    pub chart: ChartConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `ter_ponctualite=debug`
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common or json)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Log file path (optional, stdout if not set)
    #[serde(default)]
    pub log_file: Option<String>,
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
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Punctuality dataset
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// SQLite file, must exist at startup
    pub database: String,
}

/// Static document root
#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    pub document_root: String,
    pub index_files: Vec<String>,
}

/// Chart cache and rendering
#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    /// Cache directory, relative to the document root
    pub dir: String,
    /// URL prefix the static fallback serves the cache directory under
    pub url_prefix: String,
    pub width: u32,
    pub height: u32,
    pub y_min: f64,
    pub y_max: f64,
}
