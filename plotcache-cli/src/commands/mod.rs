//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Cache management (clear, stats)
//! - [`config`] - Configuration management (get, set, list, path)
//! - [`prewarm`] - Pre-render plots around a navigation position
//! - [`render`] - Single plot render

pub mod cache;
pub mod config;
pub mod prewarm;
pub mod render;
