//! In-flight job table.
//!
//! Single lock domain for all scheduler state: the dedup map plus the two
//! priority queues. The lock is held only for map and queue updates, never
//! across I/O or rendering. Every job owns a broadcast channel that fans
//! its outcome out to all attached waiters, the way duplicate requests are
//! coalesced onto one unit of work.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use super::job::{JobCompletion, JobError, JobPriority};
use crate::key::SegmentKey;

/// Broadcast capacity per job. Waiters read exactly one completion, so
/// this only needs to absorb a burst of simultaneous subscribers.
const COMPLETION_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    Queued,
    Running,
}

struct InFlightJob {
    priority: JobPriority,
    phase: JobPhase,
    enqueued_at: Instant,
    completion: broadcast::Sender<JobCompletion>,
    cancel: CancellationToken,
}

/// What [`JobTable::submit`] did with a request.
pub enum Submission {
    /// New job queued; the receiver delivers its completion.
    Queued(broadcast::Receiver<JobCompletion>),
    /// The key was already in flight; attached to the existing job.
    Attached(broadcast::Receiver<JobCompletion>),
}

impl Submission {
    /// The completion receiver, regardless of how the request was filed.
    pub fn into_receiver(self) -> broadcast::Receiver<JobCompletion> {
        match self {
            Submission::Queued(rx) | Submission::Attached(rx) => rx,
        }
    }
}

/// Result of trying to claim a queued job for inline execution.
pub enum TakeOver {
    /// The caller now owns the job and must complete it.
    Claimed(CancellationToken),
    /// A worker already started it; wait on the completion channel.
    AlreadyRunning,
    /// No such job. It completed or was cancelled in the meantime.
    NotFound,
}

/// Queue depths for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub running: usize,
    pub queued_interactive: usize,
    pub queued_prefetch: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.running + self.queued_interactive + self.queued_prefetch
    }
}

#[derive(Default)]
struct TableState {
    jobs: HashMap<SegmentKey, InFlightJob>,
    interactive: VecDeque<SegmentKey>,
    prefetch: VecDeque<SegmentKey>,
}

/// Tracks every queued and running render job.
///
/// Queue entries are not removed when a job is promoted, claimed inline,
/// or cancelled; [`JobTable::claim_next`] skips entries whose job no
/// longer matches the queue they came from.
pub struct JobTable {
    state: Mutex<TableState>,
    /// Signalled whenever a queue gains work.
    work_signal: Notify,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            work_signal: Notify::new(),
        }
    }

    /// Register interest in a key.
    ///
    /// Creates a queued job or attaches to the existing one. An
    /// interactive submit against a queued prefetch job promotes it to the
    /// interactive queue.
    pub fn submit(
        &self,
        key: SegmentKey,
        priority: JobPriority,
        shutdown: &CancellationToken,
    ) -> Submission {
        let mut state = self.state.lock();

        if let Some(job) = state.jobs.get_mut(&key) {
            let rx = job.completion.subscribe();
            if priority == JobPriority::Interactive
                && job.priority == JobPriority::Prefetch
                && job.phase == JobPhase::Queued
            {
                job.priority = JobPriority::Interactive;
                state.interactive.push_back(key);
                drop(state);
                self.work_signal.notify_one();
            }
            return Submission::Attached(rx);
        }

        let (tx, rx) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        state.jobs.insert(
            key,
            InFlightJob {
                priority,
                phase: JobPhase::Queued,
                enqueued_at: Instant::now(),
                completion: tx,
                cancel: shutdown.child_token(),
            },
        );
        match priority {
            JobPriority::Interactive => state.interactive.push_back(key),
            JobPriority::Prefetch => state.prefetch.push_back(key),
        }
        drop(state);
        self.work_signal.notify_one();
        Submission::Queued(rx)
    }

    /// Pop the next runnable job, interactive strictly first, FIFO within
    /// each class. Marks it running and returns its cancellation token
    /// along with how long it sat queued.
    pub fn claim_next(&self) -> Option<(SegmentKey, JobPriority, Duration, CancellationToken)> {
        let mut state = self.state.lock();
        loop {
            let (key, class) = if let Some(key) = state.interactive.pop_front() {
                (key, JobPriority::Interactive)
            } else if let Some(key) = state.prefetch.pop_front() {
                (key, JobPriority::Prefetch)
            } else {
                return None;
            };
            if let Some(job) = state.jobs.get_mut(&key) {
                if job.phase == JobPhase::Queued && job.priority == class {
                    job.phase = JobPhase::Running;
                    return Some((key, class, job.enqueued_at.elapsed(), job.cancel.clone()));
                }
            }
        }
    }

    /// Claim a still-queued job for inline execution by the caller.
    ///
    /// The job stays in the table as running, so later requests for the
    /// key keep attaching to it; the caller must finish it through
    /// [`JobTable::complete`].
    pub fn take_over(&self, key: &SegmentKey) -> TakeOver {
        let mut state = self.state.lock();
        match state.jobs.get_mut(key) {
            Some(job) if job.phase == JobPhase::Queued => {
                job.phase = JobPhase::Running;
                TakeOver::Claimed(job.cancel.clone())
            }
            Some(_) => TakeOver::AlreadyRunning,
            None => TakeOver::NotFound,
        }
    }

    /// Remove a finished job and broadcast its outcome to all waiters.
    pub fn complete(&self, key: &SegmentKey, outcome: JobCompletion) {
        let tx = {
            let mut state = self.state.lock();
            state.jobs.remove(key).map(|job| job.completion)
        };
        if let Some(tx) = tx {
            // Waiters may have gone away; that is not an error
            let _ = tx.send(outcome);
        }
    }

    /// Cancel queued prefetch jobs for `source_id` that are not in the
    /// keep set. Running jobs and interactive jobs are left alone.
    /// Returns how many jobs were cancelled.
    pub fn cancel_superseded(&self, source_id: u32, keep: &HashSet<SegmentKey>) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let stale: Vec<SegmentKey> = state
                .jobs
                .iter()
                .filter(|&(key, job)| {
                    key.source_id == source_id
                        && job.phase == JobPhase::Queued
                        && job.priority == JobPriority::Prefetch
                        && !keep.contains(key)
                })
                .map(|(key, _)| *key)
                .collect();
            stale
                .into_iter()
                .filter_map(|key| state.jobs.remove(&key))
                .collect::<Vec<InFlightJob>>()
        };

        let count = removed.len();
        for job in removed {
            job.cancel.cancel();
            let _ = job.completion.send(Err(JobError::Cancelled));
        }
        count
    }

    /// Cancel every queued job. Running jobs keep going; their artifacts
    /// land in the store as usual. Returns how many jobs were cancelled.
    pub fn cancel_queued(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let queued: Vec<SegmentKey> = state
                .jobs
                .iter()
                .filter(|(_, job)| job.phase == JobPhase::Queued)
                .map(|(key, _)| *key)
                .collect();
            state.interactive.clear();
            state.prefetch.clear();
            queued
                .into_iter()
                .filter_map(|key| state.jobs.remove(&key))
                .collect::<Vec<InFlightJob>>()
        };

        let count = removed.len();
        for job in removed {
            job.cancel.cancel();
            let _ = job.completion.send(Err(JobError::Cancelled));
        }
        count
    }

    /// Wait until new work may be available.
    pub async fn work_available(&self) {
        self.work_signal.notified().await;
    }

    /// Current queue depths.
    pub fn counts(&self) -> QueueCounts {
        let state = self.state.lock();
        let mut counts = QueueCounts::default();
        for job in state.jobs.values() {
            match job.phase {
                JobPhase::Running => counts.running += 1,
                JobPhase::Queued => match job.priority {
                    JobPriority::Interactive => counts.queued_interactive += 1,
                    JobPriority::Prefetch => counts.queued_prefetch += 1,
                },
            }
        }
        counts
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::job::JobResult;
    use bytes::Bytes;

    fn key(index: u32) -> SegmentKey {
        SegmentKey::new(1, 8192, index, 0)
    }

    fn ok_result() -> JobCompletion {
        Ok(JobResult {
            bytes: Bytes::from_static(b"png"),
            duration: Duration::from_millis(5),
        })
    }

    #[test]
    fn test_submit_then_attach() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        assert!(matches!(
            table.submit(key(0), JobPriority::Prefetch, &root),
            Submission::Queued(_)
        ));
        assert!(matches!(
            table.submit(key(0), JobPriority::Prefetch, &root),
            Submission::Attached(_)
        ));
        assert_eq!(table.counts().queued_prefetch, 1);
    }

    #[test]
    fn test_interactive_claims_before_earlier_prefetch() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        table.submit(key(0), JobPriority::Prefetch, &root);
        table.submit(key(1), JobPriority::Prefetch, &root);
        table.submit(key(2), JobPriority::Interactive, &root);

        let (first, class, _, _) = table.claim_next().unwrap();
        assert_eq!(first, key(2));
        assert_eq!(class, JobPriority::Interactive);
        let (second, _, _, _) = table.claim_next().unwrap();
        assert_eq!(second, key(0));
    }

    #[test]
    fn test_fifo_within_a_class() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        for index in 0..4 {
            table.submit(key(index), JobPriority::Prefetch, &root);
        }
        for index in 0..4 {
            let (claimed, _, _, _) = table.claim_next().unwrap();
            assert_eq!(claimed, key(index));
        }
        assert!(table.claim_next().is_none());
    }

    #[test]
    fn test_interactive_attach_promotes_queued_prefetch() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        table.submit(key(0), JobPriority::Prefetch, &root);
        table.submit(key(1), JobPriority::Prefetch, &root);
        // A viewer now wants segment 1
        assert!(matches!(
            table.submit(key(1), JobPriority::Interactive, &root),
            Submission::Attached(_)
        ));

        let counts = table.counts();
        assert_eq!(counts.queued_interactive, 1);
        assert_eq!(counts.queued_prefetch, 1);

        let (first, class, _, _) = table.claim_next().unwrap();
        assert_eq!(first, key(1));
        assert_eq!(class, JobPriority::Interactive);
        // The stale prefetch queue entry for key 1 is skipped
        let (second, class, _, _) = table.claim_next().unwrap();
        assert_eq!(second, key(0));
        assert_eq!(class, JobPriority::Prefetch);
        assert!(table.claim_next().is_none());
    }

    #[tokio::test]
    async fn test_complete_reaches_all_waiters() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        let mut rx_a = table
            .submit(key(3), JobPriority::Interactive, &root)
            .into_receiver();
        let mut rx_b = table
            .submit(key(3), JobPriority::Interactive, &root)
            .into_receiver();

        let (claimed, _, _, _) = table.claim_next().unwrap();
        table.complete(&claimed, ok_result());

        assert!(rx_a.recv().await.unwrap().is_ok());
        assert!(rx_b.recv().await.unwrap().is_ok());
        assert_eq!(table.counts().total(), 0);
    }

    #[test]
    fn test_take_over_claims_only_queued_jobs() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        table.submit(key(5), JobPriority::Interactive, &root);
        assert!(matches!(table.take_over(&key(5)), TakeOver::Claimed(_)));
        // Second claim sees it running
        assert!(matches!(table.take_over(&key(5)), TakeOver::AlreadyRunning));
        assert!(matches!(table.take_over(&key(6)), TakeOver::NotFound));

        // The queue entry is stale now
        assert!(table.claim_next().is_none());
    }

    #[tokio::test]
    async fn test_cancel_superseded_spares_keep_set_and_other_classes() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        table.submit(key(0), JobPriority::Prefetch, &root);
        let mut doomed_rx = table
            .submit(key(1), JobPriority::Prefetch, &root)
            .into_receiver();
        table.submit(key(2), JobPriority::Interactive, &root);
        // Running prefetch job survives too
        table.submit(key(4), JobPriority::Prefetch, &root);
        let mut running = None;
        while let Some((claimed, _, _, _)) = table.claim_next() {
            if claimed == key(2) {
                continue;
            }
            running = Some(claimed);
            break;
        }
        assert_eq!(running, Some(key(0)));

        let keep: HashSet<SegmentKey> = [key(4)].into_iter().collect();
        let cancelled = table.cancel_superseded(1, &keep);

        assert_eq!(cancelled, 1);
        assert_eq!(doomed_rx.recv().await.unwrap(), Err(JobError::Cancelled));
        let counts = table.counts();
        assert_eq!(counts.running, 2);
        assert_eq!(counts.queued_prefetch, 1);
    }

    #[tokio::test]
    async fn test_cancel_queued_flushes_everything_queued() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        table.submit(key(0), JobPriority::Interactive, &root);
        table.submit(key(1), JobPriority::Prefetch, &root);
        let (running_key, _, _, _) = table.claim_next().unwrap();

        assert_eq!(table.cancel_queued(), 1);
        let counts = table.counts();
        assert_eq!(counts.running, 1);
        assert_eq!(counts.queued_interactive + counts.queued_prefetch, 0);
        assert_eq!(running_key, key(0));
        assert!(table.claim_next().is_none());
    }

    #[test]
    fn test_child_tokens_inherit_shutdown() {
        let table = JobTable::new();
        let root = CancellationToken::new();

        table.submit(key(9), JobPriority::Prefetch, &root);
        let (_, _, _, token) = table.claim_next().unwrap();
        assert!(!token.is_cancelled());
        root.cancel();
        assert!(token.is_cancelled());
    }
}
