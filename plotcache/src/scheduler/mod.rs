//! Pre-generation scheduling.
//!
//! Turns navigation updates into prioritized render work. A single job
//! table deduplicates requests against in-flight work, a fixed pool of
//! workers drains it interactive-first, and window planning decides what
//! to prefetch and what to cancel as the viewer moves.

mod engine;
mod job;
mod table;
mod window;

pub use engine::{PlanSummary, PreGenScheduler, SchedulerStats, SchedulerStatsSnapshot};
pub use job::{JobCompletion, JobError, JobPriority, JobResult};
pub use table::{JobTable, QueueCounts, Submission, TakeOver};
pub use window::{plan_window, NavigationWindow};
