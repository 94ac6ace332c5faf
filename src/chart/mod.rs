//! Chart rendering module
//!
//! Turns a region's punctuality series into a PNG file. The cache only sees
//! the `ChartRenderer` trait; `PlottersRenderer` draws with `plotters`.

mod plot;
pub mod series;

pub use plot::PlottersRenderer;

use std::path::Path;

use crate::store::StoreError;

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    /// The region has no measured month, nothing to plot
    #[error("no punctuality data for region '{0}'")]
    NoData(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to prepare chart output: {0}")]
    Io(#[from] std::io::Error),

    #[error("drawing failed: {0}")]
    Drawing(String),
}

/// What a successful render produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub points: usize,
}

/// Blocking chart producer
///
/// Implementations write the image to `output` and release every drawing
/// resource before returning.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, region: &str, output: &Path) -> Result<RenderSummary, ChartError>;
}
