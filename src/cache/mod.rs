//! Chart cache module
//!
//! A cached chart is a PNG file at a deterministic path; its presence is the
//! whole cache state. Handlers only see the `ChartCache` trait, so the
//! presence check can be swapped for another keying scheme.

mod file;

pub use file::FileChartCache;

#[cfg(test)]
pub(crate) use file::tests::{scratch_dir, CountingRenderer};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::chart::ChartError;

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Render(#[from] ChartError),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How the artifact was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Rendered,
}

/// A chart available on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartArtifact {
    /// Filesystem location
    pub path: PathBuf,
    /// URL under which the static fallback serves it
    pub url: String,
    pub outcome: CacheOutcome,
}

#[async_trait]
pub trait ChartCache: Send + Sync {
    /// Return the chart of `region`, rendering it first if it is not cached.
    async fn ensure(&self, region: &str) -> Result<ChartArtifact, CacheError>;
}

/// Deterministic file name of a region's chart
pub fn chart_file_name(region: &str) -> String {
    format!("ponctualite_{region}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_file_name() {
        assert_eq!(chart_file_name("Bretagne"), "ponctualite_Bretagne.png");
        assert_eq!(
            chart_file_name("Île-de-France"),
            "ponctualite_Île-de-France.png"
        );
    }
}
