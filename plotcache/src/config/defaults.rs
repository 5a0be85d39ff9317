//! Default values and constants for all configuration settings.
//!
//! Contains the `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default disk capacity for rendered artifacts.
pub const DEFAULT_CACHE_CAPACITY: u64 = 5 * 1024 * 1024 * 1024;

/// Caching is on unless explicitly disabled.
pub const DEFAULT_CACHE_ENABLED: bool = true;

/// Artifacts older than this are swept by the maintenance task.
pub const DEFAULT_MAX_AGE_HOURS: u64 = 24;

/// Interval between maintenance passes.
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 3600;

/// Default artifact directory (~/.plotcache/artifacts).
pub fn default_cache_directory() -> PathBuf {
    config_directory().join("artifacts")
}

// =============================================================================
// Segment defaults
// =============================================================================

/// Segment lengths viewers can switch between, in samples.
pub const DEFAULT_SEGMENT_LENGTHS: [u32; 3] = [524288, 65536, 8192];

/// Default overlap between consecutive segments, in percent.
pub const DEFAULT_OVERLAP_PERCENT: f64 = 0.0;

/// Largest overlap a key may carry, in percent. At 50% the stride is
/// half a segment; beyond that segment starts stop advancing usefully.
pub const DEFAULT_MAX_OVERLAP_PERCENT: f64 = 50.0;

// =============================================================================
// Prefetch defaults
// =============================================================================

/// Segments covered on each side of the viewer's position.
pub const DEFAULT_PREFETCH_RADIUS: u32 = 5;

/// Render worker pool size.
pub const DEFAULT_RENDER_WORKERS: usize = 4;

/// Upper bound on configured render workers; above this the blocking
/// pool churns without rendering any faster.
pub const MAX_RENDER_WORKERS: usize = 64;

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            segments: SegmentSettings::default(),
            prefetch: PrefetchSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            capacity: DEFAULT_CACHE_CAPACITY,
            enabled: DEFAULT_CACHE_ENABLED,
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
        }
    }
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            lengths: DEFAULT_SEGMENT_LENGTHS.to_vec(),
            default_overlap: DEFAULT_OVERLAP_PERCENT,
            max_overlap: DEFAULT_MAX_OVERLAP_PERCENT,
        }
    }
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            radius: DEFAULT_PREFETCH_RADIUS,
            workers: DEFAULT_RENDER_WORKERS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { file: None }
    }
}
