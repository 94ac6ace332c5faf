//! Logger module
//!
//! Provides logging utilities for the service including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Chart cache and render tracing
//! - Error and warning logging
//!
//! Everything is emitted through `tracing`; `init` installs the subscriber.

mod format;

pub use format::AccessLogEntry;

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::cache::CacheOutcome;
use crate::config::{Config, LoggingConfig};
use crate::handler::ParsedRequest;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`. Should be called once at
/// application startup.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.log_file.as_deref() {
        Some(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.try_init(),
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> std::io::Result<std::fs::File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("Server started, listening on http://{addr}");
    tracing::info!(
        database = %config.data.database,
        document_root = %config.site.document_root,
        chart_dir = %config.chart_dir().display(),
        "Serving punctuality charts"
    );
    match config.server.workers {
        Some(workers) => tracing::info!("Worker threads: {workers}"),
        None => tracing::info!("Worker threads: default (CPU cores)"),
    }
    if let Some(max) = config.performance.max_connections {
        tracing::info!("Max connections: {max}");
    }
}

pub fn log_shutdown() {
    tracing::info!("Shutdown requested, no longer accepting connections");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Trace how a request was decomposed
pub fn log_parsed_request(req: &ParsedRequest) {
    tracing::debug!(
        path = ?req.path_segments,
        body = %req.body.summary(),
        params = ?req.params(),
        "Parsed request"
    );
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_cache_hit(region: &str) {
    tracing::debug!(region, "Chart cache hit");
}

pub fn log_cache_miss(region: &str) {
    tracing::info!(region, "Chart cache miss, rendering");
}

pub fn log_chart_render(region: &str, points: usize, output: &Path) {
    tracing::debug!(region, points, output = %output.display(), "Rendering chart");
}

pub fn log_chart_ready(region: &str, points: usize) {
    tracing::info!(region, points, "Chart rendered");
}

pub fn log_chart_served(region: &str, path: &Path, outcome: CacheOutcome) {
    tracing::debug!(region, path = %path.display(), ?outcome, "Chart served");
}
