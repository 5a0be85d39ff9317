//! Runtime configuration snapshots.
//!
//! The cache manager and its background tasks never read `ConfigFile`
//! directly. They take an immutable [`CacheConfig`] snapshot from a
//! [`ConfigServer`], so a reload mid-operation can never produce a view
//! that mixes old and new values. Each snapshot carries a version number
//! that increments on every reload.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::defaults::{DEFAULT_SEGMENT_LENGTHS, MAX_RENDER_WORKERS};
use super::file::{ConfigFile, ConfigFileError};
use crate::key::overlap_bp_from_percent;

/// Immutable view of the configuration as of one version.
///
/// Values are pre-digested for the runtime: durations instead of raw
/// hour/second counts, basis points instead of percentages, and worker
/// counts already clamped to a sane range.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Monotonic snapshot version, starting at 1.
    pub version: u64,
    /// Whether artifacts are persisted at all.
    pub cache_enabled: bool,
    /// Artifact store disk budget in bytes.
    pub capacity_bytes: u64,
    /// Remove artifacts older than this; `None` keeps them until evicted.
    pub max_age: Option<Duration>,
    /// How often the maintenance sweep runs.
    pub gc_interval: Duration,
    /// Segment lengths the review tool can display, largest first.
    pub segment_lengths: Vec<u32>,
    /// Overlap applied when the viewer does not request one, in basis points.
    pub default_overlap_bp: u16,
    /// Largest overlap percentage a request may carry.
    pub max_overlap_percent: f64,
    /// Segments pre-rendered on each side of the navigation position.
    pub prefetch_radius: u32,
    /// Background render workers.
    pub worker_count: usize,
    /// Directory holding rendered artifacts.
    pub cache_directory: PathBuf,
}

impl CacheConfig {
    fn from_file(file: &ConfigFile, version: u64) -> Self {
        let max_age = (file.cache.max_age_hours > 0)
            .then(|| Duration::from_secs(file.cache.max_age_hours * 3600));
        let segment_lengths = if file.segments.lengths.is_empty() {
            DEFAULT_SEGMENT_LENGTHS.to_vec()
        } else {
            file.segments.lengths.clone()
        };
        let default_overlap_bp =
            overlap_bp_from_percent(file.segments.default_overlap, file.segments.max_overlap)
                .unwrap_or(0);

        Self {
            version,
            cache_enabled: file.cache.enabled,
            capacity_bytes: file.cache.capacity,
            max_age,
            gc_interval: Duration::from_secs(file.cache.gc_interval_secs.max(1)),
            segment_lengths,
            default_overlap_bp,
            max_overlap_percent: file.segments.max_overlap,
            prefetch_radius: file.prefetch.radius,
            worker_count: file.prefetch.workers.clamp(1, MAX_RENDER_WORKERS),
            cache_directory: file.cache.directory.clone(),
        }
    }
}

/// Hands out [`CacheConfig`] snapshots and re-reads the file on demand.
pub struct ConfigServer {
    /// Where to re-read from; `None` means the config was handed in
    /// directly and reloads keep the current snapshot.
    path: Option<PathBuf>,
    current: RwLock<Arc<CacheConfig>>,
}

impl ConfigServer {
    /// Build a server from an already-loaded config. Reloads are no-ops.
    pub fn from_file(file: ConfigFile) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(CacheConfig::from_file(&file, 1))),
        }
    }

    /// Build a server backed by a config file on disk.
    ///
    /// A missing file yields defaults, matching `ConfigFile::load_from`.
    pub fn at_path(path: PathBuf) -> Result<Self, ConfigFileError> {
        let file = ConfigFile::load_from(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(CacheConfig::from_file(&file, 1))),
        })
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Arc<CacheConfig> {
        self.current.read().clone()
    }

    /// Version of the current snapshot.
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Re-read the backing file and publish a new snapshot.
    ///
    /// Returns the new snapshot. A parse failure leaves the current
    /// snapshot in place and reports the error.
    pub fn reload(&self) -> Result<Arc<CacheConfig>, ConfigFileError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };
        let file = ConfigFile::load_from(path)?;
        let snapshot = self.apply(&file);
        info!(version = snapshot.version, "configuration reloaded");
        Ok(snapshot)
    }

    /// Publish a new snapshot built from `file`, bumping the version.
    pub fn apply(&self, file: &ConfigFile) -> Arc<CacheConfig> {
        let mut current = self.current.write();
        let snapshot = Arc::new(CacheConfig::from_file(file, current.version + 1));
        *current = snapshot.clone();
        snapshot
    }
}
