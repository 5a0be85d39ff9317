//! Crate-level error type for the cache manager facade.

use thiserror::Error;

use crate::config::ConfigFileError;
use crate::key::KeyError;
use crate::render::RenderError;
use crate::scheduler::JobError;
use crate::store::StoreError;

/// Errors surfaced by [`CacheManager`](crate::manager::CacheManager).
///
/// Scheduler jobs report failures as plain strings so completions stay
/// cheap to broadcast; this type folds those back together with the
/// richer errors from the store and config layers.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested key failed validation against the configuration.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// The source data backing the segment does not exist.
    #[error("source data not found: {0}")]
    NotFound(String),

    /// Rendering the plot failed.
    #[error("render failed: {0}")]
    Render(String),

    /// The artifact store could not persist or serve the artifact.
    #[error("artifact store error: {0}")]
    Store(String),

    /// Configuration could not be read or applied.
    #[error(transparent)]
    Config(#[from] ConfigFileError),

    /// The request was cancelled, normally at shutdown.
    #[error("request cancelled")]
    Cancelled,

    /// A render task ended without producing a result.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JobError> for CacheError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(msg) => CacheError::NotFound(msg),
            JobError::Render(msg) => CacheError::Render(msg),
            JobError::Store(msg) => CacheError::Store(msg),
            JobError::Cancelled => CacheError::Cancelled,
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        CacheError::Store(err.to_string())
    }
}

impl From<RenderError> for CacheError {
    fn from(err: RenderError) -> Self {
        if err.is_not_found() {
            CacheError::NotFound(err.to_string())
        } else {
            CacheError::Render(err.to_string())
        }
    }
}
