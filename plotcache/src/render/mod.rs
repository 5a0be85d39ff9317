//! Plot rendering boundary.
//!
//! The cache never draws anything itself; it hands a [`SegmentKey`] to a
//! [`PlotRenderer`] and stores whatever bytes come back. Renderers must be
//! pure: the same key over the same source data yields the same artifact.
//! [`RectanglePlotRenderer`] is the shipped implementation, drawing a
//! waveform envelope with a segment strip via `tiny-skia`. Sample data
//! comes through the [`SampleSource`] trait with file-backed and synthetic
//! implementations.

mod plot;
mod source;

pub use plot::{PlotStyle, RectanglePlotRenderer};
pub use source::{BinaryFileSource, SyntheticSource};

use std::io;

use bytes::Bytes;
use thiserror::Error;

use crate::key::SegmentKey;

/// Errors reading samples from a signal source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No source exists for this id.
    #[error("signal source {source_id} not found")]
    NotFound { source_id: u32 },

    /// The segment starts past the end of the source signal.
    #[error("segment {segment_index} is out of range for source {source_id}")]
    SegmentOutOfRange { source_id: u32, segment_index: u32 },

    /// The source exists but could not be read.
    #[error("failed to read source {source_id}: {source}")]
    Io {
        source_id: u32,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    /// Whether this error means the requested data does not exist,
    /// as opposed to a read failure on data that should exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SourceError::NotFound { .. } | SourceError::SegmentOutOfRange { .. }
        )
    }
}

/// Errors producing a plot artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Reading the segment samples failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Rasterising or encoding the plot failed.
    #[error("failed to render plot for {key}: {reason}")]
    Raster { key: String, reason: String },
}

impl RenderError {
    /// Whether the failure is a missing source or segment rather than a
    /// genuine rendering fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RenderError::Source(e) if e.is_not_found())
    }
}

/// Reads segment sample windows out of a signal source.
///
/// Implementations are called from blocking worker context, so plain
/// synchronous I/O is fine.
pub trait SampleSource: Send + Sync {
    /// Read the samples covered by `key`. The final segment of a source may
    /// be partial, in which case fewer than `segment_length` samples are
    /// returned. A start offset at or past the end of the signal is
    /// [`SourceError::SegmentOutOfRange`].
    fn read_segment(&self, key: &SegmentKey) -> Result<Vec<f32>, SourceError>;

    /// Total number of samples in the source signal.
    fn len(&self, source_id: u32) -> Result<u64, SourceError>;
}

/// Produces an encoded plot artifact for a segment key.
///
/// Must be deterministic: the cache treats two renders of the same key as
/// interchangeable. Invoked on blocking worker threads, never on the
/// async runtime directly.
pub trait PlotRenderer: Send + Sync {
    /// Render the plot for `key` as encoded image bytes.
    fn render(&self, key: &SegmentKey) -> Result<Bytes, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let missing = SourceError::NotFound { source_id: 9 };
        let range = SourceError::SegmentOutOfRange {
            source_id: 9,
            segment_index: 120,
        };
        let io = SourceError::Io {
            source_id: 9,
            source: io::Error::other("disk on fire"),
        };

        assert!(missing.is_not_found());
        assert!(range.is_not_found());
        assert!(!io.is_not_found());

        assert!(RenderError::from(range).is_not_found());
        let raster = RenderError::Raster {
            key: "s9/l8192/i0/o0.00%".to_string(),
            reason: "zero-sized canvas".to_string(),
        };
        assert!(!raster.is_not_found());
    }
}
