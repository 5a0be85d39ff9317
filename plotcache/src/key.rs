//! Segment keys and their stable on-disk identity.
//!
//! A [`SegmentKey`] uniquely identifies one rendered plot: which source
//! signal, at which segment length, which segment index, and with how much
//! overlap between neighboring segments. Overlap is carried in basis points
//! of a percent (2550 = 25.50%) so keys are `Eq + Hash` and the encoded id
//! never depends on float formatting.
//!
//! Two encodings are derived from a key:
//! - [`SegmentKey::stable_id`]: 16 hex chars of a BLAKE3 hash over a
//!   canonical byte layout. Stable across processes and platforms, used in
//!   logs and APIs.
//! - [`SegmentKey::artifact_file_name`]: a fully invertible file name, so the
//!   store can rebuild its index from a directory scan after restart.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

/// Basis points per percent (overlap of 1.00% == 100 bp).
pub const BASIS_POINTS_PER_PERCENT: u16 = 100;

/// Errors rejecting a key before any I/O happens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeyError {
    /// Source id is negative or exceeds the representable range
    #[error("invalid source id {source_id}: must be in 0..={max}", max = u32::MAX)]
    SourceOutOfRange { source_id: i64 },

    /// Segment index is negative or exceeds the representable range
    #[error("invalid segment index {index}: must be in 0..={max}", max = u32::MAX)]
    IndexOutOfRange { index: i64 },

    /// Segment length is not one of the configured levels
    #[error("segment length {segment_length} is not a configured level")]
    LengthNotConfigured { segment_length: i64 },

    /// Overlap percentage is outside the allowed range
    #[error("overlap {overlap}% is outside 0%..={max}%")]
    OverlapOutOfRange { overlap: f64, max: f64 },
}

/// Identity of one segment plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentKey {
    /// Source signal (raw data file / channel) id
    pub source_id: u32,
    /// Segment length in samples
    pub segment_length: u32,
    /// Zero-based segment index within the source
    pub segment_index: u32,
    /// Overlap between neighboring segments, in basis points of a percent
    pub overlap_bp: u16,
}

impl SegmentKey {
    /// Create a key from already-validated fields.
    pub fn new(source_id: u32, segment_length: u32, segment_index: u32, overlap_bp: u16) -> Self {
        Self {
            source_id,
            segment_length,
            segment_index,
            overlap_bp,
        }
    }

    /// Validate untrusted input and build a key.
    ///
    /// This is the entry point for values coming from the serving layer.
    /// Rejects negative ids/indices, a segment length that is not one of
    /// `allowed_lengths`, and overlap outside `0..=max_overlap_percent`.
    pub fn from_raw(
        source_id: i64,
        segment_length: i64,
        segment_index: i64,
        overlap_percent: f64,
        allowed_lengths: &[u32],
        max_overlap_percent: f64,
    ) -> Result<Self, KeyError> {
        let source_id =
            u32::try_from(source_id).map_err(|_| KeyError::SourceOutOfRange { source_id })?;
        let segment_index =
            u32::try_from(segment_index).map_err(|_| KeyError::IndexOutOfRange {
                index: segment_index,
            })?;

        let length_ok = u32::try_from(segment_length)
            .ok()
            .filter(|l| allowed_lengths.contains(l));
        let segment_length = length_ok.ok_or(KeyError::LengthNotConfigured { segment_length })?;

        let overlap_bp = overlap_bp_from_percent(overlap_percent, max_overlap_percent).ok_or(
            KeyError::OverlapOutOfRange {
                overlap: overlap_percent,
                max: max_overlap_percent,
            },
        )?;

        Ok(Self {
            source_id,
            segment_length,
            segment_index,
            overlap_bp,
        })
    }

    /// Overlap as a percentage.
    pub fn overlap_percent(&self) -> f64 {
        f64::from(self.overlap_bp) / f64::from(BASIS_POINTS_PER_PERCENT)
    }

    /// Short deterministic identifier: 16 hex chars of a BLAKE3 hash over
    /// the canonical byte layout (fixed field order, little-endian).
    pub fn stable_id(&self) -> String {
        let mut buf = [0u8; 14];
        buf[0..4].copy_from_slice(&self.source_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.segment_length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.segment_index.to_le_bytes());
        buf[12..14].copy_from_slice(&self.overlap_bp.to_le_bytes());

        let hash = blake3::hash(&buf);
        hash.to_hex()[..16].to_string()
    }

    /// File name the artifact is stored under.
    ///
    /// Encodes the full tuple so [`parse_artifact_file_name`] can rebuild
    /// the key from a directory listing.
    pub fn artifact_file_name(&self) -> String {
        format!(
            "s{:08}-l{}-i{:06}-o{:04}.png",
            self.source_id, self.segment_length, self.segment_index, self.overlap_bp
        )
    }

    /// Distance in samples between the starts of consecutive segments.
    ///
    /// Zero overlap gives `segment_length`; 50% overlap gives half of it.
    /// Never less than 1 sample.
    pub fn stride(&self) -> u64 {
        let length = u64::from(self.segment_length);
        let kept = 10_000u64.saturating_sub(u64::from(self.overlap_bp));
        (length * kept / 10_000).max(1)
    }

    /// First sample covered by this segment.
    pub fn sample_start(&self) -> u64 {
        u64::from(self.segment_index) * self.stride()
    }

    /// Sample range `[start, start + length)` covered by this segment.
    pub fn sample_range(&self) -> Range<u64> {
        let start = self.sample_start();
        start..start + u64::from(self.segment_length)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "s{}/l{}/i{}/o{:.2}%",
            self.source_id,
            self.segment_length,
            self.segment_index,
            self.overlap_percent()
        )
    }
}

/// Convert an overlap percentage to basis points, or None if out of range.
pub fn overlap_bp_from_percent(percent: f64, max_percent: f64) -> Option<u16> {
    if !percent.is_finite() || percent < 0.0 || percent > max_percent {
        return None;
    }
    let bp = (percent * f64::from(BASIS_POINTS_PER_PERCENT)).round();
    u16::try_from(bp as i64).ok()
}

/// Parse an artifact file name back into its key.
///
/// Returns None for anything that is not a plotcache artifact, so foreign
/// files in the cache directory are skipped rather than treated as errors.
pub fn parse_artifact_file_name(name: &str) -> Option<SegmentKey> {
    let stem = name.strip_suffix(".png")?;
    let mut parts = stem.split('-');

    let source_id: u32 = parts.next()?.strip_prefix('s')?.parse().ok()?;
    let segment_length: u32 = parts.next()?.strip_prefix('l')?.parse().ok()?;
    let segment_index: u32 = parts.next()?.strip_prefix('i')?.parse().ok()?;
    let overlap_bp: u16 = parts.next()?.strip_prefix('o')?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(SegmentKey {
        source_id,
        segment_length,
        segment_index,
        overlap_bp,
    })
}
