//! Render worker pool and navigation-driven planning.
//!
//! Workers pull jobs off the [`JobTable`] interactive-first and render
//! them on the blocking thread pool. Navigation updates expand into
//! prefetch jobs through [`plan_window`], cancelling queued work the new
//! window made irrelevant. Interactive requests jump the queue and can be
//! taken over for inline execution when the caller's patience runs out.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job::{JobCompletion, JobError, JobPriority, JobResult};
use super::table::{JobTable, QueueCounts, Submission, TakeOver};
use super::window::{plan_window, NavigationWindow};
use crate::key::SegmentKey;
use crate::render::PlotRenderer;
use crate::store::{ArtifactStatus, ArtifactStore};

/// What a navigation update did to the queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// New prefetch jobs queued.
    pub planned: usize,
    /// Candidates already in flight, left attached to the existing job.
    pub attached: usize,
    /// Candidates already Ready or rendering into the store.
    pub already_cached: usize,
    /// Queued prefetch jobs cancelled as out-of-window.
    pub cancelled: usize,
}

/// Scheduler counters, updated lock-free by workers.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    planned: AtomicU64,
    render_nanos: AtomicU64,
}

impl SchedulerStats {
    fn record_outcome(&self, outcome: &JobCompletion) {
        match outcome {
            Ok(result) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                self.render_nanos
                    .fetch_add(result.duration.as_nanos() as u64, Ordering::Relaxed);
            }
            Err(JobError::Cancelled) => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn record_planned(&self, count: usize) {
        self.planned.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_cancelled(&self, count: usize) {
        self.cancelled.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let render_nanos = self.render_nanos.load(Ordering::Relaxed);
        SchedulerStatsSnapshot {
            completed,
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            planned: self.planned.load(Ordering::Relaxed),
            average_render_time: if completed > 0 {
                Some(Duration::from_nanos(render_nanos / completed))
            } else {
                None
            },
        }
    }
}

/// Point-in-time view of the scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStatsSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub planned: u64,
    pub average_render_time: Option<Duration>,
}

/// Owns the render workers and the job table.
///
/// The worker count is fixed at start; configuration changes to it apply
/// on the next start.
pub struct PreGenScheduler {
    table: Arc<JobTable>,
    store: Arc<ArtifactStore>,
    renderer: Arc<dyn PlotRenderer>,
    stats: Arc<SchedulerStats>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PreGenScheduler {
    /// Spawn `worker_count` render workers against `store` and `renderer`.
    ///
    /// All job cancellation tokens are children of `shutdown`.
    pub fn start(
        store: Arc<ArtifactStore>,
        renderer: Arc<dyn PlotRenderer>,
        worker_count: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let table = Arc::new(JobTable::new());
        let stats = Arc::new(SchedulerStats::default());

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&table),
                Arc::clone(&store),
                Arc::clone(&renderer),
                Arc::clone(&stats),
                shutdown.clone(),
            )));
        }
        info!(workers = worker_count, "pre-generation scheduler started");

        Self {
            table,
            store,
            renderer,
            stats,
            shutdown,
            workers: Mutex::new(workers),
        }
    }

    /// Re-plan prefetching for a viewer's new position.
    ///
    /// Expands the window across `segment_lengths`, cancels queued
    /// prefetch jobs for this source that fell outside the new window,
    /// then queues whatever is not already cached or in flight.
    pub fn on_navigation(
        &self,
        window: &NavigationWindow,
        segment_lengths: &[u32],
    ) -> PlanSummary {
        let keys = plan_window(window, segment_lengths);
        let keep: HashSet<SegmentKey> = keys.iter().copied().collect();
        let cancelled = self.table.cancel_superseded(window.source_id, &keep);
        self.stats.record_cancelled(cancelled);

        let mut summary = PlanSummary {
            cancelled,
            ..Default::default()
        };
        for key in keys {
            match self.store.status_of(&key) {
                Some(ArtifactStatus::Ready) | Some(ArtifactStatus::Pending) => {
                    summary.already_cached += 1;
                    continue;
                }
                _ => {}
            }
            match self.table.submit(key, JobPriority::Prefetch, &self.shutdown) {
                Submission::Queued(_) => summary.planned += 1,
                Submission::Attached(_) => summary.attached += 1,
            }
        }
        self.stats.record_planned(summary.planned);

        debug!(
            source_id = window.source_id,
            center = window.center_index,
            planned = summary.planned,
            attached = summary.attached,
            cached = summary.already_cached,
            cancelled = summary.cancelled,
            "navigation window planned"
        );
        summary
    }

    /// File an interactive request for one key.
    ///
    /// Attaches to any in-flight job, promoting a queued prefetch job to
    /// the interactive class.
    pub fn request_now(&self, key: SegmentKey) -> Submission {
        self.table.submit(key, JobPriority::Interactive, &self.shutdown)
    }

    /// Try to claim `key` for execution on the caller's task.
    pub fn take_over(&self, key: &SegmentKey) -> TakeOver {
        self.table.take_over(key)
    }

    /// Render `key` on the caller's task and publish the outcome to every
    /// waiter. Pairs with a successful [`PreGenScheduler::take_over`].
    pub async fn run_inline(&self, key: &SegmentKey) -> JobCompletion {
        let outcome = execute_render(&self.store, &self.renderer, key).await;
        self.stats.record_outcome(&outcome);
        self.table.complete(key, outcome.clone());
        outcome
    }

    /// Current queue depths.
    pub fn queue_counts(&self) -> QueueCounts {
        self.table.counts()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the workers. Queued jobs are cancelled and their waiters
    /// notified; a job mid-render finishes and its artifact is kept.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let cancelled = self.table.cancel_queued();
        if cancelled > 0 {
            debug!(cancelled, "flushed queued jobs at shutdown");
        }
        self.stats.record_cancelled(cancelled);

        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "render worker join failed");
            }
        }
        info!("pre-generation scheduler stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    table: Arc<JobTable>,
    store: Arc<ArtifactStore>,
    renderer: Arc<dyn PlotRenderer>,
    stats: Arc<SchedulerStats>,
    shutdown: CancellationToken,
) {
    debug!(worker_id, "render worker started");
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        if let Some((key, priority, waited, cancel)) = table.claim_next() {
            if cancel.is_cancelled() {
                let outcome = Err(JobError::Cancelled);
                stats.record_outcome(&outcome);
                table.complete(&key, outcome);
                continue;
            }
            debug!(
                worker_id,
                key = %key.stable_id(),
                ?priority,
                queued_ms = waited.as_millis() as u64,
                "render job starting"
            );
            let outcome = execute_render(&store, &renderer, &key).await;
            stats.record_outcome(&outcome);
            table.complete(&key, outcome);
            continue;
        }

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = table.work_available() => {}
        }
    }
    debug!(worker_id, "render worker stopped");
}

/// Render one key and persist the artifact.
///
/// The store entry is pending for the duration of the render and failed
/// on any error, so status probes always see the attempt.
async fn execute_render(
    store: &ArtifactStore,
    renderer: &Arc<dyn PlotRenderer>,
    key: &SegmentKey,
) -> JobCompletion {
    store.mark_pending(key);
    let started = Instant::now();

    let render_key = *key;
    let render = Arc::clone(renderer);
    let rendered = tokio::task::spawn_blocking(move || render.render(&render_key)).await;

    let bytes = match rendered {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            store.mark_failed(key);
            let message = e.to_string();
            if e.is_not_found() {
                debug!(key = %key.stable_id(), error = %message, "segment not renderable");
                return Err(JobError::NotFound(message));
            }
            warn!(key = %key.stable_id(), error = %message, "render failed");
            return Err(JobError::Render(message));
        }
        Err(join_error) => {
            store.mark_failed(key);
            warn!(key = %key.stable_id(), error = %join_error, "render task panicked");
            return Err(JobError::Render(format!("render task failed: {join_error}")));
        }
    };
    let duration = started.elapsed();

    match store.put(key, bytes.clone(), duration).await {
        Ok(entry) => {
            debug!(
                key = %key.stable_id(),
                bytes = entry.size_bytes,
                render_ms = duration.as_millis() as u64,
                "artifact stored"
            );
            Ok(JobResult { bytes, duration })
        }
        Err(e) => {
            store.mark_failed(key);
            warn!(key = %key.stable_id(), error = %e, "failed to persist artifact");
            Err(JobError::Store(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderError, SourceError};
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl CountingRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl PlotRenderer for CountingRenderer {
        fn render(&self, key: &SegmentKey) -> Result<Bytes, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(format!("plot:{}", key.stable_id())))
        }
    }

    struct NotFoundRenderer;

    impl PlotRenderer for NotFoundRenderer {
        fn render(&self, key: &SegmentKey) -> Result<Bytes, RenderError> {
            Err(RenderError::Source(SourceError::NotFound {
                source_id: key.source_id,
            }))
        }
    }

    fn new_store() -> (TempDir, Arc<ArtifactStore>) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::open(tmp.path(), 64 << 20).unwrap());
        (tmp, store)
    }

    async fn wait_until_idle(scheduler: &PreGenScheduler) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while scheduler.queue_counts().total() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scheduler did not drain in time");
    }

    #[tokio::test]
    async fn test_workers_render_a_planned_window() {
        let (_tmp, store) = new_store();
        let renderer = CountingRenderer::new();
        let scheduler = PreGenScheduler::start(
            Arc::clone(&store),
            renderer.clone(),
            2,
            CancellationToken::new(),
        );

        let window = NavigationWindow::new(1, 8192, 2, 1, 0);
        let summary = scheduler.on_navigation(&window, &[8192]);
        assert_eq!(summary.planned, 3);

        wait_until_idle(&scheduler).await;
        for index in 1..=3 {
            let key = SegmentKey::new(1, 8192, index, 0);
            assert_eq!(store.status_of(&key), Some(ArtifactStatus::Ready));
        }
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.stats().completed, 3);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_identical_window_plans_nothing_the_second_time() {
        let (_tmp, store) = new_store();
        let scheduler = PreGenScheduler::start(
            store,
            CountingRenderer::new(),
            2,
            CancellationToken::new(),
        );

        let window = NavigationWindow::new(1, 8192, 100, 5, 0);
        let first = scheduler.on_navigation(&window, &[8192]);
        assert_eq!(first.planned, 11);
        wait_until_idle(&scheduler).await;

        let second = scheduler.on_navigation(&window, &[8192]);
        assert_eq!(second.planned, 0);
        assert_eq!(second.already_cached, 11);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_new_window_cancels_stale_queued_jobs() {
        let (_tmp, store) = new_store();
        // No workers, so queued jobs stay queued
        let scheduler =
            PreGenScheduler::start(store, CountingRenderer::new(), 0, CancellationToken::new());

        let first = scheduler.on_navigation(&NavigationWindow::new(1, 8192, 100, 2, 0), &[8192]);
        assert_eq!(first.planned, 5);

        // One step to the right: 98 drops out, 103 is new
        let second = scheduler.on_navigation(&NavigationWindow::new(1, 8192, 101, 2, 0), &[8192]);
        assert_eq!(second.cancelled, 1);
        assert_eq!(second.attached, 4);
        assert_eq!(second.planned, 1);
        assert_eq!(scheduler.queue_counts().queued_prefetch, 5);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_windows_for_other_sources_are_untouched() {
        let (_tmp, store) = new_store();
        let scheduler =
            PreGenScheduler::start(store, CountingRenderer::new(), 0, CancellationToken::new());

        scheduler.on_navigation(&NavigationWindow::new(1, 8192, 10, 2, 0), &[8192]);
        let other = scheduler.on_navigation(&NavigationWindow::new(2, 8192, 900, 2, 0), &[8192]);

        assert_eq!(other.cancelled, 0);
        assert_eq!(scheduler.queue_counts().queued_prefetch, 10);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_now_promotes_a_planned_job() {
        let (_tmp, store) = new_store();
        let scheduler =
            PreGenScheduler::start(store, CountingRenderer::new(), 0, CancellationToken::new());

        scheduler.on_navigation(&NavigationWindow::new(1, 8192, 5, 2, 0), &[8192]);
        let wanted = SegmentKey::new(1, 8192, 7, 0);
        assert!(matches!(
            scheduler.request_now(wanted),
            Submission::Attached(_)
        ));

        // The promoted job is claimed ahead of the rest of the window
        let (claimed, class, _, _) = scheduler.table.claim_next().unwrap();
        assert_eq!(claimed, wanted);
        assert_eq!(class, JobPriority::Interactive);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_take_over_runs_inline_and_notifies_waiters() {
        let (_tmp, store) = new_store();
        let scheduler = PreGenScheduler::start(
            Arc::clone(&store),
            CountingRenderer::new(),
            0,
            CancellationToken::new(),
        );

        let key = SegmentKey::new(3, 8192, 1, 0);
        let submission = scheduler.request_now(key);
        assert!(matches!(submission, Submission::Queued(_)));
        let mut rx = submission.into_receiver();

        assert!(matches!(scheduler.take_over(&key), TakeOver::Claimed(_)));
        let outcome = scheduler.run_inline(&key).await;
        assert!(outcome.is_ok());

        assert_eq!(store.status_of(&key), Some(ArtifactStatus::Ready));
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(scheduler.queue_counts().total(), 0);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_source_marks_the_entry_failed() {
        let (_tmp, store) = new_store();
        let scheduler = PreGenScheduler::start(
            Arc::clone(&store),
            Arc::new(NotFoundRenderer),
            1,
            CancellationToken::new(),
        );

        let key = SegmentKey::new(77, 8192, 0, 0);
        let mut rx = scheduler.request_now(key).into_receiver();
        let outcome = rx.recv().await.unwrap();

        assert!(matches!(outcome, Err(JobError::NotFound(_))));
        assert_eq!(store.status_of(&key), Some(ArtifactStatus::Failed));
        assert_eq!(scheduler.stats().failed, 1);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_jobs() {
        let (_tmp, store) = new_store();
        let scheduler =
            PreGenScheduler::start(store, CountingRenderer::new(), 0, CancellationToken::new());

        let summary = scheduler.on_navigation(&NavigationWindow::new(1, 8192, 50, 2, 0), &[8192]);
        assert_eq!(summary.planned, 5);

        scheduler.shutdown().await;
        assert_eq!(scheduler.queue_counts().total(), 0);
        assert_eq!(scheduler.stats().cancelled, 5);
    }
}
