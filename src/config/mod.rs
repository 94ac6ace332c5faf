// Configuration module entry point
// Loads the service configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

// Re-export public types
pub use state::AppState;
pub use types::{
    ChartConfig, Config, DataConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig,
    SiteConfig,
};

/// Config file looked up when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration using the first command line argument as file path
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    ///
    /// The file is optional; `PONCTUALITE_<SECTION>__<KEY>` environment
    /// variables override it.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("PONCTUALITE").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "ter-ponctualite")?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("data.database", "hydro_mesure.sqlite")?
            .set_default("site.document_root", "client")?
            .set_default("site.index_files", vec!["index.html", "index.htm"])?
            .set_default("chart.dir", "courbes")?
            .set_default("chart.url_prefix", "/courbes")?
            .set_default("chart.width", 1800)?
            .set_default("chart.height", 600)?
            .set_default("chart.y_min", 75.0)?
            .set_default("chart.y_max", 100.0)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Directory the chart cache writes into
    pub fn chart_dir(&self) -> PathBuf {
        PathBuf::from(&self.site.document_root).join(&self.chart.dir)
    }
}
