//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use plotcache::config::ConfigFileError;
use plotcache::error::CacheError;
use plotcache::render::RenderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Cache directory operation failed
    Cache(String),
    /// Failed to start or drive the cache manager
    Manager(CacheError),
    /// Failed to render a plot
    Render(RenderError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Render(e) if e.is_not_found() => {
                eprintln!();
                eprintln!("The source signal was not found. Check that:");
                eprintln!("  1. --data-dir points at your signal directory");
                eprintln!("  2. The requested segment lies within the signal");
                eprintln!("Or omit --data-dir to render a synthetic signal instead.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'plotcache config list' to review the current settings.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Cache(msg) => write!(f, "Cache error: {}", msg),
            CliError::Manager(e) => write!(f, "Cache manager error: {}", e),
            CliError::Render(e) => write!(f, "Failed to render plot: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Manager(e) => Some(e),
            CliError::Render(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Manager(e)
    }
}
