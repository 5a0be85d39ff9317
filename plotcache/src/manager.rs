//! Cache manager facade.
//!
//! [`CacheManager`] wires the artifact store, the render scheduler, and
//! the configuration server together. It is the only type the serving
//! layer needs to hold: request artifacts with
//! [`get_or_generate`](CacheManager::get_or_generate), report navigation
//! with [`pregenerate`](CacheManager::pregenerate), and inspect the whole
//! pipeline with [`status`](CacheManager::status).
//!
//! Every request takes a fresh config snapshot first, so `config set`
//! followed by a reload changes behavior without a restart. A capacity
//! reduction takes effect on the next artifact write.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, ConfigServer};
use crate::error::CacheError;
use crate::key::SegmentKey;
use crate::render::PlotRenderer;
use crate::scheduler::{
    JobCompletion, NavigationWindow, PlanSummary, PreGenScheduler, QueueCounts,
    SchedulerStatsSnapshot, TakeOver,
};
use crate::store::{ArtifactStore, Reclaimed, StoreSnapshot, StoreStatsSnapshot};

/// Aggregate status across the store, the queues, and the config.
#[derive(Debug, Clone)]
pub struct ManagerStatus {
    pub config_version: u64,
    pub cache_enabled: bool,
    pub store: StoreSnapshot,
    pub store_stats: StoreStatsSnapshot,
    pub queues: QueueCounts,
    pub scheduler: SchedulerStatsSnapshot,
}

/// Owns the store, the scheduler workers, and the maintenance task.
///
/// Dropping the manager aborts nothing on its own; call
/// [`shutdown`](CacheManager::shutdown) to stop the background tasks and
/// flush the queues.
pub struct CacheManager {
    config: Arc<ConfigServer>,
    store: Arc<ArtifactStore>,
    renderer: Arc<dyn PlotRenderer>,
    scheduler: PreGenScheduler,
    shutdown: CancellationToken,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl CacheManager {
    /// Open the store, start the render workers, and spawn the
    /// maintenance task. Must be called within a Tokio runtime.
    ///
    /// Opening the store scans the cache directory, so artifacts from a
    /// previous run are served immediately.
    pub fn start(
        config: Arc<ConfigServer>,
        renderer: Arc<dyn PlotRenderer>,
    ) -> Result<Self, CacheError> {
        let snapshot = config.snapshot();
        let store = Arc::new(ArtifactStore::open(
            snapshot.cache_directory.clone(),
            snapshot.capacity_bytes,
        )?);
        store.set_max_age(snapshot.max_age);

        let shutdown = CancellationToken::new();
        let scheduler = PreGenScheduler::start(
            store.clone(),
            renderer.clone(),
            snapshot.worker_count,
            shutdown.child_token(),
        );
        let maintenance =
            spawn_maintenance(store.clone(), config.clone(), shutdown.child_token());

        info!(
            version = snapshot.version,
            directory = %snapshot.cache_directory.display(),
            capacity = snapshot.capacity_bytes,
            workers = snapshot.worker_count,
            enabled = snapshot.cache_enabled,
            "cache manager started"
        );
        Ok(Self {
            config,
            store,
            renderer,
            scheduler,
            shutdown,
            maintenance: Mutex::new(Some(maintenance)),
        })
    }

    /// Validate raw request parameters against the current configuration.
    ///
    /// `overlap_percent` of `None` applies the configured default overlap.
    pub fn validate_key(
        &self,
        source_id: i64,
        segment_length: i64,
        segment_index: i64,
        overlap_percent: Option<f64>,
    ) -> Result<SegmentKey, CacheError> {
        let snapshot = self.config.snapshot();
        let overlap =
            overlap_percent.unwrap_or(f64::from(snapshot.default_overlap_bp) / 100.0);
        Ok(SegmentKey::from_raw(
            source_id,
            segment_length,
            segment_index,
            overlap,
            &snapshot.segment_lengths,
            snapshot.max_overlap_percent,
        )?)
    }

    /// Return the artifact for `key`, rendering it if necessary.
    ///
    /// A store hit returns immediately. On a miss the key is filed as an
    /// interactive job, which promotes an already-queued prefetch job for
    /// the same key instead of duplicating it. If no completion arrives
    /// within `timeout` the calling task takes the job over and renders
    /// inline, so a saturated worker pool can never stall the viewer.
    /// A zero `timeout` skips the wait entirely.
    pub async fn get_or_generate(
        &self,
        key: SegmentKey,
        timeout: Duration,
    ) -> Result<Bytes, CacheError> {
        let snapshot = self.config.snapshot();
        self.refresh_store_settings(&snapshot);

        if !snapshot.cache_enabled {
            return self.render_uncached(key).await;
        }

        if let Some(bytes) = self.store.read(&key).await {
            return Ok(bytes);
        }

        let mut rx = self.scheduler.request_now(key).into_receiver();
        if timeout.is_zero() {
            return self.generate_inline(key).await;
        }

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(result) => self.completion_to_bytes(key, result).await,
            Err(_) => {
                debug!(
                    key = %key,
                    timeout_ms = timeout.as_millis() as u64,
                    "queue wait expired, rendering inline"
                );
                self.generate_inline(key).await
            }
        }
    }

    /// Plan and queue the pre-generation window around a navigation
    /// position, for every configured segment length. Prefetch jobs that
    /// fell out of the window are cancelled; cached artifacts are never
    /// touched. No-op while the cache is disabled.
    pub fn pregenerate(&self, window: &NavigationWindow) -> PlanSummary {
        let snapshot = self.config.snapshot();
        if !snapshot.cache_enabled {
            return PlanSummary::default();
        }
        self.refresh_store_settings(&snapshot);
        self.scheduler.on_navigation(window, &snapshot.segment_lengths)
    }

    /// Drop cached artifacts for one source, or for all sources.
    ///
    /// Only the store is touched. In-flight jobs finish normally and
    /// re-populate the cache; a stale artifact is gone either way.
    pub async fn clear(&self, source_id: Option<u32>) -> Reclaimed {
        self.store.invalidate_all(source_id).await
    }

    /// Aggregate status for the CLI and dashboards.
    pub fn status(&self) -> ManagerStatus {
        let snapshot = self.config.snapshot();
        ManagerStatus {
            config_version: snapshot.version,
            cache_enabled: snapshot.cache_enabled,
            store: self.store.snapshot(),
            store_stats: self.store.stats(),
            queues: self.scheduler.queue_counts(),
            scheduler: self.scheduler.stats(),
        }
    }

    /// Re-read the config file and apply the new snapshot to the store.
    pub fn reload_config(&self) -> Result<Arc<CacheConfig>, CacheError> {
        let snapshot = self.config.reload()?;
        self.refresh_store_settings(&snapshot);
        Ok(snapshot)
    }

    /// Stop the workers and the maintenance task. Queued jobs are
    /// cancelled and their waiters notified; a job mid-render finishes
    /// and its artifact is kept.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.shutdown.cancel();
        let handle = self.maintenance.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "maintenance task ended abnormally");
            }
        }
        info!("cache manager stopped");
    }

    fn refresh_store_settings(&self, snapshot: &CacheConfig) {
        self.store.set_capacity(snapshot.capacity_bytes);
        self.store.set_max_age(snapshot.max_age);
    }

    /// Render without consulting or populating the store.
    async fn render_uncached(&self, key: SegmentKey) -> Result<Bytes, CacheError> {
        let renderer = self.renderer.clone();
        let result = tokio::task::spawn_blocking(move || renderer.render(&key))
            .await
            .map_err(|err| CacheError::Internal(format!("render task failed: {err}")))?;
        Ok(result?)
    }

    /// Take over the queued job for `key` and render it on this task.
    ///
    /// Loops because the job can complete, get claimed by a worker, or
    /// get flushed between the probe and the takeover; every arm either
    /// returns or re-files the job.
    async fn generate_inline(&self, key: SegmentKey) -> Result<Bytes, CacheError> {
        loop {
            match self.scheduler.take_over(&key) {
                TakeOver::Claimed(_token) => {
                    let outcome = self.scheduler.run_inline(&key).await;
                    return outcome_to_bytes(outcome);
                }
                TakeOver::AlreadyRunning => {
                    let result = self
                        .scheduler
                        .request_now(key)
                        .into_receiver()
                        .recv()
                        .await;
                    return self.completion_to_bytes(key, result).await;
                }
                TakeOver::NotFound => {
                    if let Some(bytes) = self.store.read(&key).await {
                        return Ok(bytes);
                    }
                    // Finished without an artifact; file a fresh job and
                    // claim it on the next pass.
                    let _ = self.scheduler.request_now(key);
                }
            }
        }
    }

    async fn completion_to_bytes(
        &self,
        key: SegmentKey,
        result: Result<JobCompletion, RecvError>,
    ) -> Result<Bytes, CacheError> {
        match result {
            Ok(outcome) => outcome_to_bytes(outcome),
            Err(_) => {
                // Channel closed without a completion. The artifact may
                // still have landed; prefer it over an error.
                if let Some(bytes) = self.store.read(&key).await {
                    Ok(bytes)
                } else {
                    Err(CacheError::Internal(
                        "render job ended without a result".to_string(),
                    ))
                }
            }
        }
    }
}

fn outcome_to_bytes(outcome: JobCompletion) -> Result<Bytes, CacheError> {
    match outcome {
        Ok(done) => Ok(done.bytes),
        Err(err) => Err(err.into()),
    }
}

/// Periodic sweep for expired artifacts and capacity overruns.
///
/// The interval is re-read from the config every pass, so a changed
/// `gc_interval_secs` applies from the following tick.
fn spawn_maintenance(
    store: Arc<ArtifactStore>,
    config: Arc<ConfigServer>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = config.snapshot().gc_interval;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let snapshot = config.snapshot();
            store.set_capacity(snapshot.capacity_bytes);
            store.set_max_age(snapshot.max_age);
            let expired = store.sweep_expired().await;
            let evicted = store.evict_if_over_capacity().await;
            if expired.files + evicted.files > 0 {
                debug!(
                    expired = expired.files,
                    evicted = evicted.files,
                    "maintenance pass reclaimed artifacts"
                );
            }
        }
        debug!("maintenance task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::render::{RenderError, SourceError};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingRenderer {
        fn slow(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl PlotRenderer for CountingRenderer {
        fn render(&self, _key: &SegmentKey) -> Result<Bytes, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            Ok(Bytes::from(vec![7u8; 128]))
        }
    }

    /// Fails the first render, succeeds afterwards.
    #[derive(Default)]
    struct FlakyRenderer {
        calls: AtomicUsize,
    }

    impl PlotRenderer for FlakyRenderer {
        fn render(&self, key: &SegmentKey) -> Result<Bytes, RenderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RenderError::Raster {
                    key: key.to_string(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(Bytes::from_static(b"second attempt"))
            }
        }
    }

    struct MissingSourceRenderer;

    impl PlotRenderer for MissingSourceRenderer {
        fn render(&self, key: &SegmentKey) -> Result<Bytes, RenderError> {
            Err(RenderError::from(SourceError::NotFound {
                source_id: key.source_id,
            }))
        }
    }

    /// Renders fixed-size payloads so capacity arithmetic is exact.
    struct SizedRenderer(usize);

    impl PlotRenderer for SizedRenderer {
        fn render(&self, _key: &SegmentKey) -> Result<Bytes, RenderError> {
            Ok(Bytes::from(vec![0u8; self.0]))
        }
    }

    fn test_config(dir: &Path) -> ConfigFile {
        let mut file = ConfigFile::default();
        file.cache.directory = dir.to_path_buf();
        file.cache.max_age_hours = 0;
        file.segments.lengths = vec![5000, 1000];
        file.prefetch.workers = 2;
        file.prefetch.radius = 2;
        file
    }

    fn start_manager(
        file: ConfigFile,
        renderer: Arc<dyn PlotRenderer>,
    ) -> (Arc<CacheManager>, Arc<ConfigServer>) {
        let server = Arc::new(ConfigServer::from_file(file));
        let manager = CacheManager::start(server.clone(), renderer)
            .map(Arc::new)
            .unwrap();
        (manager, server)
    }

    async fn wait_until_idle(manager: &CacheManager) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.status().queues.total() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queues did not drain");
    }

    #[tokio::test]
    async fn test_concurrent_requests_render_once() {
        let temp = TempDir::new().unwrap();
        // Slow render keeps the job in flight while every request files.
        let renderer = Arc::new(CountingRenderer::slow(Duration::from_millis(50)));
        let (manager, _server) = start_manager(test_config(temp.path()), renderer.clone());

        let key = SegmentKey::new(1, 5000, 0, 0);
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.get_or_generate(key, Duration::from_secs(5)).await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            let bytes = result.unwrap().unwrap();
            assert_eq!(bytes.len(), 128);
        }
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_second_request_is_a_store_hit() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let (manager, _server) = start_manager(test_config(temp.path()), renderer.clone());

        let key = SegmentKey::new(4, 5000, 7, 0);
        manager
            .get_or_generate(key, Duration::from_secs(5))
            .await
            .unwrap();
        manager
            .get_or_generate(key, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        let stats = manager.status().store_stats;
        assert_eq!(stats.hits, 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_timeout_completes_inline() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let (manager, _server) = start_manager(test_config(temp.path()), renderer.clone());

        let key = SegmentKey::new(2, 5000, 3, 0);
        let bytes = manager.get_or_generate(key, Duration::ZERO).await.unwrap();

        assert_eq!(bytes.len(), 128);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status().store.ready, 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_navigation_supersede_keeps_cached_artifacts() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let (manager, _server) = start_manager(test_config(temp.path()), renderer.clone());

        for idx in [0, 1] {
            manager
                .get_or_generate(SegmentKey::new(1, 5000, idx, 0), Duration::from_secs(5))
                .await
                .unwrap();
        }
        assert_eq!(manager.status().store.ready, 2);

        // Navigate far away; the old artifacts stay on disk.
        let window = NavigationWindow::new(1, 5000, 100, 1, 0);
        manager.pregenerate(&window);
        wait_until_idle(&manager).await;

        let calls_before = renderer.calls.load(Ordering::SeqCst);
        manager
            .get_or_generate(SegmentKey::new(1, 5000, 0, 0), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), calls_before);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_pregenerate_covers_every_configured_length() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let mut file = test_config(temp.path());
        file.prefetch.radius = 1;
        let (manager, _server) = start_manager(file, renderer.clone());

        // Radius 1 at length 5000 plus the converted window at length
        // 1000 gives three keys per length.
        let window = NavigationWindow::new(1, 5000, 10, 1, 0);
        let summary = manager.pregenerate(&window);
        assert_eq!(summary.planned, 6);

        wait_until_idle(&manager).await;
        assert_eq!(manager.status().store.ready, 6);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_capacity_reduction_applies_on_next_write() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(SizedRenderer(4096));
        let (manager, server) = start_manager(test_config(temp.path()), renderer);

        for idx in 0..3 {
            manager
                .get_or_generate(SegmentKey::new(1, 5000, idx, 0), Duration::from_secs(5))
                .await
                .unwrap();
        }
        assert_eq!(manager.status().store.entries, 3);

        // Shrink the budget below current usage. Nothing happens until
        // the next write, which evicts oldest-first.
        let mut file = test_config(temp.path());
        file.cache.capacity = 6 * 1024;
        server.apply(&file);
        assert_eq!(manager.status().store.entries, 3);

        manager
            .get_or_generate(SegmentKey::new(1, 5000, 3, 0), Duration::from_secs(5))
            .await
            .unwrap();

        let snap = manager.status().store;
        assert!(snap.size_bytes <= 6 * 1024);
        assert_eq!(snap.entries, 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_render_is_retried_on_next_request() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(FlakyRenderer::default());
        let (manager, _server) = start_manager(test_config(temp.path()), renderer.clone());

        let key = SegmentKey::new(6, 5000, 1, 0);
        let err = manager
            .get_or_generate(key, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Render(_)));

        // The failed entry counts as a miss, so a new attempt runs.
        let bytes = manager
            .get_or_generate(key, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(bytes, Bytes::from_static(b"second attempt"));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_source_maps_to_not_found() {
        let temp = TempDir::new().unwrap();
        let (manager, _server) =
            start_manager(test_config(temp.path()), Arc::new(MissingSourceRenderer));

        let err = manager
            .get_or_generate(SegmentKey::new(9, 5000, 0, 0), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_cache_renders_every_request() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let mut file = test_config(temp.path());
        file.cache.enabled = false;
        let (manager, _server) = start_manager(file, renderer.clone());

        let key = SegmentKey::new(1, 5000, 0, 0);
        manager
            .get_or_generate(key, Duration::from_secs(5))
            .await
            .unwrap();
        manager
            .get_or_generate(key, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.status().store.entries, 0);

        // Pre-generation is a no-op while disabled.
        let summary = manager.pregenerate(&NavigationWindow::new(1, 5000, 5, 2, 0));
        assert_eq!(summary, PlanSummary::default());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_clear_one_source_leaves_others() {
        let temp = TempDir::new().unwrap();
        let renderer = Arc::new(CountingRenderer::default());
        let (manager, _server) = start_manager(test_config(temp.path()), renderer);

        for source in [1, 2] {
            manager
                .get_or_generate(SegmentKey::new(source, 5000, 0, 0), Duration::from_secs(5))
                .await
                .unwrap();
        }
        assert_eq!(manager.status().store.entries, 2);

        let reclaimed = manager.clear(Some(1)).await;
        assert_eq!(reclaimed.files, 1);
        assert_eq!(manager.status().store.entries, 1);

        let reclaimed = manager.clear(None).await;
        assert_eq!(reclaimed.files, 1);
        assert_eq!(manager.status().store.entries, 0);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_validate_key_uses_current_config() {
        let temp = TempDir::new().unwrap();
        let (manager, _server) = start_manager(
            test_config(temp.path()),
            Arc::new(CountingRenderer::default()),
        );

        let key = manager.validate_key(1, 5000, 2, None).unwrap();
        assert_eq!(key.segment_length, 5000);
        assert_eq!(key.overlap_bp, 0);

        let err = manager.validate_key(1, 999, 0, None).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));

        let err = manager.validate_key(1, 5000, 0, Some(80.0)).unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_status_tracks_config_version() {
        let temp = TempDir::new().unwrap();
        let (manager, server) = start_manager(
            test_config(temp.path()),
            Arc::new(CountingRenderer::default()),
        );

        assert_eq!(manager.status().config_version, 1);
        server.apply(&test_config(temp.path()));
        assert_eq!(manager.status().config_version, 2);
        manager.shutdown().await;
    }
}
