//! Job types shared across the scheduler.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Scheduling class for render jobs.
///
/// Interactive jobs always run before prefetch jobs; within a class,
/// submission order is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPriority {
    /// A viewer is waiting on this artifact right now.
    Interactive,
    /// Speculative work planned from a navigation window.
    Prefetch,
}

/// Successful render output delivered to job waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    /// Encoded artifact bytes.
    pub bytes: Bytes,
    /// Wall-clock render duration.
    pub duration: Duration,
}

/// Failure delivered to job waiters.
///
/// Broadcast receivers need `Clone`, so this carries reduced messages
/// rather than the source error chain. The full error is logged at the
/// point of failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The source or segment does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The renderer failed.
    #[error("render failed: {0}")]
    Render(String),

    /// The artifact could not be persisted.
    #[error("store failed: {0}")]
    Store(String),

    /// The job was cancelled before it produced anything.
    #[error("job cancelled")]
    Cancelled,
}

/// Outcome broadcast to every waiter of a job.
pub type JobCompletion = Result<JobResult, JobError>;
