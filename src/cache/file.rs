//! File presence chart cache
//!
//! Misses render on the blocking pool. A per-region lock makes concurrent
//! misses for one region wait for the first render instead of redoing it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use super::{chart_file_name, CacheError, CacheOutcome, ChartArtifact, ChartCache};
use crate::chart::{ChartRenderer, RenderSummary};
use crate::logger;

type RegionLock = Arc<tokio::sync::Mutex<()>>;

pub struct FileChartCache {
    dir: PathBuf,
    url_prefix: String,
    renderer: Arc<dyn ChartRenderer>,
    /// One lock per region ever missed. Entries are never removed: handlers
    /// only reach the cache for regions of the dataset, which bounds the map.
    in_flight: Mutex<HashMap<String, RegionLock>>,
}

impl FileChartCache {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: &str, renderer: Arc<dyn ChartRenderer>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            renderer,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, region: &str) -> PathBuf {
        self.dir.join(chart_file_name(region))
    }

    pub fn url_for(&self, region: &str) -> String {
        format!("{}/{}", self.url_prefix, chart_file_name(region))
    }

    fn region_lock(&self, region: &str) -> RegionLock {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(in_flight.entry(region.to_string()).or_default())
    }

    fn artifact(&self, region: &str, path: PathBuf, outcome: CacheOutcome) -> ChartArtifact {
        ChartArtifact {
            path,
            url: self.url_for(region),
            outcome,
        }
    }

    /// Render on the blocking pool while holding the region lock.
    ///
    /// The blocking task owns the guard and moves the chart in place itself,
    /// so a request dropped mid-render neither loses the file nor lets another
    /// render of the region start before this one ends.
    async fn render(
        &self,
        region: &str,
        path: PathBuf,
        guard: OwnedMutexGuard<()>,
    ) -> Result<(), CacheError> {
        let renderer = Arc::clone(&self.renderer);
        let owned_region = region.to_string();
        tokio::task::spawn_blocking(move || {
            let result = render_in_place(renderer.as_ref(), &owned_region, &path);
            drop(guard);
            result
        })
        .await??;
        Ok(())
    }
}

/// Render into a scratch file, then move it in place so readers never see
/// a partially written chart.
fn render_in_place(
    renderer: &dyn ChartRenderer,
    region: &str,
    path: &Path,
) -> Result<RenderSummary, CacheError> {
    let scratch = path.with_extension("partial.png");
    match renderer.render(region, &scratch) {
        Ok(summary) => {
            std::fs::rename(&scratch, path)?;
            logger::log_chart_ready(region, summary.points);
            Ok(summary)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&scratch);
            Err(e.into())
        }
    }
}

#[async_trait]
impl ChartCache for FileChartCache {
    async fn ensure(&self, region: &str) -> Result<ChartArtifact, CacheError> {
        let path = self.path_for(region);
        if tokio::fs::try_exists(&path).await? {
            logger::log_cache_hit(region);
            return Ok(self.artifact(region, path, CacheOutcome::Hit));
        }

        let guard = self.region_lock(region).lock_owned().await;

        // Another request may have rendered it while we waited
        if tokio::fs::try_exists(&path).await? {
            logger::log_cache_hit(region);
            return Ok(self.artifact(region, path, CacheOutcome::Hit));
        }

        logger::log_cache_miss(region);
        self.render(region, path.clone(), guard).await?;

        Ok(self.artifact(region, path, CacheOutcome::Rendered))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chart::ChartError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Renderer that writes a stub PNG and counts its invocations
    pub struct CountingRenderer {
        pub calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
        no_data: bool,
        fail_first: bool,
    }

    impl CountingRenderer {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                delay: Duration::ZERO,
                no_data: false,
                fail_first: false,
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        pub fn without_data() -> Self {
            Self {
                no_data: true,
                ..Self::new()
            }
        }

        /// Slow renderer whose first call fails with a drawing error
        pub fn failing_once(delay: Duration) -> Self {
            Self {
                delay,
                fail_first: true,
                ..Self::new()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Highest number of renders seen running at the same time
        pub fn max_active(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }

        fn draw(&self, call: usize, region: &str, output: &Path) -> Result<RenderSummary, ChartError> {
            std::thread::sleep(self.delay);
            if self.no_data {
                return Err(ChartError::NoData(region.to_string()));
            }
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output, b"\x89PNG\r\n\x1a\n")?;
            if self.fail_first && call == 0 {
                return Err(ChartError::Drawing("font not found".to_string()));
            }
            Ok(RenderSummary { points: 2 })
        }
    }

    impl ChartRenderer for CountingRenderer {
        fn render(&self, region: &str, output: &Path) -> Result<RenderSummary, ChartError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(running, Ordering::SeqCst);
            let result = self.draw(call, region, output);
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    pub fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ter-ponctualite-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_second_call_is_a_hit() {
        let renderer = Arc::new(CountingRenderer::new());
        let cache = FileChartCache::new(scratch_dir(), "/courbes", renderer.clone());

        let first = cache.ensure("Bretagne").await.unwrap();
        assert_eq!(first.outcome, CacheOutcome::Rendered);
        assert!(first.path.exists());
        assert_eq!(first.url, "/courbes/ponctualite_Bretagne.png");

        let second = cache.ensure("Bretagne").await.unwrap();
        assert_eq!(second.outcome, CacheOutcome::Hit);
        assert_eq!(second.path, first.path);
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_never_rerendered() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ponctualite_Corse.png"), b"stale").unwrap();

        let renderer = Arc::new(CountingRenderer::new());
        let cache = FileChartCache::new(&dir, "/courbes/", renderer.clone());
        let artifact = cache.ensure("Corse").await.unwrap();

        assert_eq!(artifact.outcome, CacheOutcome::Hit);
        assert_eq!(artifact.url, "/courbes/ponctualite_Corse.png");
        assert_eq!(renderer.calls(), 0);
        assert_eq!(std::fs::read(artifact.path).unwrap(), b"stale");
    }

    #[tokio::test]
    async fn test_failed_render_leaves_no_entry() {
        let renderer = Arc::new(CountingRenderer::without_data());
        let cache = FileChartCache::new(scratch_dir(), "/courbes", renderer.clone());

        let err = cache.ensure("Corse").await.unwrap_err();
        assert!(matches!(err, CacheError::Render(ChartError::NoData(_))));
        assert!(!cache.path_for("Corse").exists());

        assert!(cache.ensure("Corse").await.is_err());
        assert_eq!(renderer.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_render_once() {
        let renderer = Arc::new(CountingRenderer::slow(Duration::from_millis(100)));
        let cache = Arc::new(FileChartCache::new(
            scratch_dir(),
            "/courbes",
            renderer.clone(),
        ));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure("Bretagne").await })
            })
            .collect();

        let mut rendered = 0;
        for task in tasks {
            let artifact = task.await.unwrap().unwrap();
            if artifact.outcome == CacheOutcome::Rendered {
                rendered += 1;
            }
        }

        assert_eq!(renderer.calls(), 1);
        assert_eq!(rendered, 1);
    }

    #[tokio::test]
    async fn test_distinct_regions_render_separately() {
        let renderer = Arc::new(CountingRenderer::new());
        let cache = FileChartCache::new(scratch_dir(), "/courbes", renderer.clone());

        cache.ensure("Bretagne").await.unwrap();
        cache.ensure("Île-de-France").await.unwrap();

        assert_eq!(renderer.calls(), 2);
        assert!(cache.path_for("Île-de-France").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_survives_dropped_request() {
        let renderer = Arc::new(CountingRenderer::slow(Duration::from_millis(300)));
        let cache = FileChartCache::new(scratch_dir(), "/courbes", renderer.clone());

        let dropped =
            tokio::time::timeout(Duration::from_millis(50), cache.ensure("Bretagne")).await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let path = cache.path_for("Bretagne");
        assert!(path.exists());
        assert!(!path.with_extension("partial.png").exists());

        let artifact = cache.ensure("Bretagne").await.unwrap();
        assert_eq!(artifact.outcome, CacheOutcome::Hit);
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_request_after_dropped_one_waits_for_its_render() {
        let renderer = Arc::new(CountingRenderer::slow(Duration::from_millis(300)));
        let cache = FileChartCache::new(scratch_dir(), "/courbes", renderer.clone());

        let dropped =
            tokio::time::timeout(Duration::from_millis(50), cache.ensure("Bretagne")).await;
        assert!(dropped.is_err());

        let artifact = cache.ensure("Bretagne").await.unwrap();
        assert_eq!(artifact.outcome, CacheOutcome::Hit);
        assert_eq!(renderer.calls(), 1);
        assert_eq!(renderer.max_active(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_render_keeps_region_exclusive() {
        let renderer = Arc::new(CountingRenderer::failing_once(Duration::from_millis(200)));
        let cache = Arc::new(FileChartCache::new(
            scratch_dir(),
            "/courbes",
            renderer.clone(),
        ));
        let ensure = |cache: &Arc<FileChartCache>| {
            let cache = Arc::clone(cache);
            tokio::spawn(async move { cache.ensure("Bretagne").await })
        };

        let first = ensure(&cache);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = ensure(&cache);
        // arrives while the queued request renders, after the first one failed
        tokio::time::sleep(Duration::from_millis(250)).await;
        let late = ensure(&cache);

        assert!(first.await.unwrap().is_err());
        let queued = queued.await.unwrap().unwrap();
        let late = late.await.unwrap().unwrap();

        assert_eq!(queued.outcome, CacheOutcome::Rendered);
        assert_eq!(late.outcome, CacheOutcome::Hit);
        assert_eq!(renderer.calls(), 2);
        assert_eq!(renderer.max_active(), 1);
        assert!(!cache.path_for("Bretagne").with_extension("partial.png").exists());
    }
}
