//! Sample sources backing the shipped renderer.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::PathBuf;

use super::{SampleSource, SourceError};
use crate::key::SegmentKey;

/// Bytes per stored sample (32-bit little-endian float).
const SAMPLE_BYTES: u64 = 4;

fn io_error(source_id: u32, source: std::io::Error) -> SourceError {
    SourceError::Io { source_id, source }
}

/// Reads segments out of raw `.f32` signal files.
///
/// Each source is a single file named `{source_id:08}.f32` under the root
/// directory, holding the signal as contiguous little-endian `f32`
/// samples. Only the requested byte range is read per segment.
#[derive(Debug, Clone)]
pub struct BinaryFileSource {
    root: PathBuf,
}

impl BinaryFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the signal file for a source id.
    pub fn source_path(&self, source_id: u32) -> PathBuf {
        self.root.join(format!("{source_id:08}.f32"))
    }

    fn source_len(&self, source_id: u32) -> Result<u64, SourceError> {
        match std::fs::metadata(self.source_path(source_id)) {
            Ok(meta) => Ok(meta.len() / SAMPLE_BYTES),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SourceError::NotFound { source_id })
            }
            Err(e) => Err(io_error(source_id, e)),
        }
    }
}

impl SampleSource for BinaryFileSource {
    fn read_segment(&self, key: &SegmentKey) -> Result<Vec<f32>, SourceError> {
        let total = self.source_len(key.source_id)?;
        let start = key.sample_start();
        if start >= total {
            return Err(SourceError::SegmentOutOfRange {
                source_id: key.source_id,
                segment_index: key.segment_index,
            });
        }
        let count = u64::from(key.segment_length).min(total - start);

        let mut file =
            File::open(self.source_path(key.source_id)).map_err(|e| io_error(key.source_id, e))?;
        file.seek(SeekFrom::Start(start * SAMPLE_BYTES))
            .map_err(|e| io_error(key.source_id, e))?;
        let mut raw = vec![0u8; (count * SAMPLE_BYTES) as usize];
        file.read_exact(&mut raw)
            .map_err(|e| io_error(key.source_id, e))?;

        Ok(raw
            .chunks_exact(SAMPLE_BYTES as usize)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    fn len(&self, source_id: u32) -> Result<u64, SourceError> {
        self.source_len(source_id)
    }
}

/// Deterministic generated signal for demos and tests.
///
/// Every source id yields the same waveform on every run: a mix of three
/// sine components with frequencies derived from the id.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    samples_per_source: u64,
}

impl SyntheticSource {
    pub fn new(samples_per_source: u64) -> Self {
        Self { samples_per_source }
    }

    fn sample(source_id: u32, n: u64) -> f32 {
        let t = n as f32;
        let base = 0.002 + (source_id % 7) as f32 * 0.0004;
        (t * base).sin() * 0.6 + (t * base * 3.7).sin() * 0.25 + (t * base * 11.3).sin() * 0.15
    }
}

impl SampleSource for SyntheticSource {
    fn read_segment(&self, key: &SegmentKey) -> Result<Vec<f32>, SourceError> {
        let start = key.sample_start();
        if start >= self.samples_per_source {
            return Err(SourceError::SegmentOutOfRange {
                source_id: key.source_id,
                segment_index: key.segment_index,
            });
        }
        let count = u64::from(key.segment_length).min(self.samples_per_source - start);
        Ok((start..start + count)
            .map(|n| Self::sample(key.source_id, n))
            .collect())
    }

    fn len(&self, _source_id: u32) -> Result<u64, SourceError> {
        Ok(self.samples_per_source)
    }
}
