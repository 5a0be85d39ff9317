//! Configuration for the plot cache.
//!
//! Persistent settings live in `~/.plotcache/config.ini`. The module is
//! split by concern:
//!
//! - [`settings`]: the `ConfigFile` struct tree
//! - [`defaults`]: every default value in one place
//! - [`parser`] / [`writer`]: INI round-tripping
//! - [`file`]: load/save entry points and `ConfigFileError`
//! - [`keys`]: `config get`/`config set` style access by dotted key name
//! - [`server`]: versioned runtime snapshots for the cache manager
//!
//! # Example
//!
//! ```no_run
//! use plotcache::config::{ConfigFile, ConfigServer};
//!
//! let file = ConfigFile::load().unwrap();
//! let server = ConfigServer::from_file(file);
//! let snapshot = server.snapshot();
//! assert!(snapshot.worker_count >= 1);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod server;
mod settings;
mod size;
mod writer;

pub use defaults::{
    default_cache_directory, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_ENABLED,
    DEFAULT_GC_INTERVAL_SECS, DEFAULT_MAX_AGE_HOURS, DEFAULT_MAX_OVERLAP_PERCENT,
    DEFAULT_OVERLAP_PERCENT, DEFAULT_PREFETCH_RADIUS, DEFAULT_RENDER_WORKERS,
    DEFAULT_SEGMENT_LENGTHS, MAX_RENDER_WORKERS,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use server::{CacheConfig, ConfigServer};
pub use settings::{
    CacheSettings, ConfigFile, LoggingSettings, PrefetchSettings, SegmentSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
