// Application state module
// Owns the shared collaborators every request handler needs

use std::path::Path;
use std::sync::Arc;

use super::types::Config;
use crate::cache::{ChartCache, FileChartCache};
use crate::chart::PlottersRenderer;
use crate::store::{RegionStore, SqliteStore, StoreError};

/// Application state
///
/// Built once in `main` and shared by every connection. Dropping it closes the
/// dataset connection.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RegionStore>,
    pub charts: Arc<dyn ChartCache>,
}

impl AppState {
    /// Wire the production collaborators: SQLite store, `plotters` renderer
    /// and file presence cache.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let store: Arc<dyn RegionStore> =
            Arc::new(SqliteStore::open(Path::new(&config.data.database))?);
        let renderer = Arc::new(PlottersRenderer::new(Arc::clone(&store), &config.chart));
        let charts = Arc::new(FileChartCache::new(
            config.chart_dir(),
            &config.chart.url_prefix,
            renderer,
        ));
        Ok(Self::new(config, store, charts))
    }

    pub fn new(config: &Config, store: Arc<dyn RegionStore>, charts: Arc<dyn ChartCache>) -> Self {
        Self {
            config: config.clone(),
            store,
            charts,
        }
    }
}
