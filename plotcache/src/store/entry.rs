//! Cache entry metadata owned by the artifact store.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::key::SegmentKey;

/// Lifecycle state of a cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// A render job has started; no artifact bytes exist yet
    Pending,
    /// Artifact written and readable at `artifact_path`
    Ready,
    /// Render or write failed; treated as a miss until re-rendered
    Failed,
}

/// Metadata for one artifact. Created Pending when a render job starts,
/// transitions to Ready or Failed, destroyed by eviction or invalidation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: SegmentKey,
    pub artifact_path: PathBuf,
    pub created_at: SystemTime,
    pub render_duration: Option<Duration>,
    pub size_bytes: u64,
    pub status: ArtifactStatus,
}

impl CacheEntry {
    /// True when the artifact can be served.
    pub fn is_ready(&self) -> bool {
        self.status == ArtifactStatus::Ready
    }
}

/// Store I/O failures. These are logged and mark the affected entry Failed;
/// they never take the process down.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Creating or scanning the cache directory failed
    #[error("cache directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an artifact (temp file or rename) failed
    #[error("writing artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
