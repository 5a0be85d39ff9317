//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Artifact cache settings
    pub cache: CacheSettings,
    /// Segment geometry settings
    pub segments: SegmentSettings,
    /// Pre-generation settings
    pub prefetch: PrefetchSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Artifact cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Directory holding rendered plot artifacts
    pub directory: PathBuf,
    /// Disk capacity in bytes; eviction keeps the store under this
    pub capacity: u64,
    /// Whether caching is enabled at all; when false every request
    /// renders inline and nothing touches the disk
    pub enabled: bool,
    /// Age in hours after which artifacts are swept, 0 keeps them forever
    pub max_age_hours: u64,
    /// Seconds between maintenance passes (age sweep and capacity check)
    pub gc_interval_secs: u64,
}

/// Segment geometry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSettings {
    /// Segment lengths in samples that viewers can switch between
    pub lengths: Vec<u32>,
    /// Overlap between consecutive segments as a percentage
    pub default_overlap: f64,
    /// Upper bound for any requested overlap percentage
    pub max_overlap: f64,
}

/// Pre-generation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchSettings {
    /// Segments covered on each side of the viewer's position
    pub radius: u32,
    /// Render worker count, applied at manager start
    pub workers: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path; empty logs to stdout only
    pub file: Option<PathBuf>,
}
