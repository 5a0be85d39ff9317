//! plotcache - Segment plot cache for signal review tools
//!
//! Review tools page through long recorded signals one segment at a time
//! and show a rendered plot per segment. Rendering is far slower than
//! navigation, so this library keeps rendered plots in a disk-backed
//! artifact store and pre-generates the plots around the reviewer's
//! position in the background.
//!
//! # High-Level API
//!
//! For most use cases, the [`manager`] module provides the facade:
//!
//! ```ignore
//! use plotcache::config::{ConfigFile, ConfigServer};
//! use plotcache::manager::CacheManager;
//! use plotcache::render::{RectanglePlotRenderer, SyntheticSource};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let server = Arc::new(ConfigServer::from_file(ConfigFile::load()?));
//! let renderer = Arc::new(RectanglePlotRenderer::new(SyntheticSource::new(1_000_000)));
//! let manager = CacheManager::start(server, renderer)?;
//!
//! let key = manager.validate_key(3, 65536, 12, None)?;
//! let png = manager.get_or_generate(key, Duration::from_millis(500)).await?;
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod manager;
pub mod render;
pub mod scheduler;
pub mod store;

/// Version of the plotcache library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
