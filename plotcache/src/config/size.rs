//! Human-readable size parsing (e.g., "5GB", "2.5GB", "500MB").

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size '{input}' - expected format like '5GB', '2.5GB', or '500MB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports:
/// - Bare numbers (treated as bytes)
/// - KB/K, MB/M, GB/G suffixes (powers of 1024)
/// - Fractional values with a suffix ("2.5GB", "0.5M")
/// - Case-insensitive, whitespace tolerant
///
/// # Examples
///
/// ```
/// use plotcache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("5GB").unwrap(), 5 * 1024 * 1024 * 1024);
/// assert_eq!(parse_size("2.5 GB").unwrap(), 2_684_354_560);
/// assert_eq!(parse_size("500mb").unwrap(), 500 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SizeParseError::new(s));
    }

    let upper = s.to_uppercase();
    let (num_str, multiplier) = if upper.ends_with("GB") || upper.ends_with('G') {
        let suffix_len = if upper.ends_with("GB") { 2 } else { 1 };
        (s[..s.len() - suffix_len].trim(), 1024u64 * 1024 * 1024)
    } else if upper.ends_with("MB") || upper.ends_with('M') {
        let suffix_len = if upper.ends_with("MB") { 2 } else { 1 };
        (s[..s.len() - suffix_len].trim(), 1024u64 * 1024)
    } else if upper.ends_with("KB") || upper.ends_with('K') {
        let suffix_len = if upper.ends_with("KB") { 2 } else { 1 };
        (s[..s.len() - suffix_len].trim(), 1024u64)
    } else if upper.ends_with('B') {
        (s[..s.len() - 1].trim(), 1u64)
    } else {
        (s, 1u64)
    };

    // Fractional values only make sense with a unit suffix
    if multiplier == 1 {
        let num: u64 = num_str.parse().map_err(|_| SizeParseError::new(s))?;
        return Ok(num);
    }

    let num: f64 = num_str.parse().map_err(|_| SizeParseError::new(s))?;
    if !num.is_finite() || num < 0.0 {
        return Err(SizeParseError::new(s));
    }
    let bytes = num * multiplier as f64;
    if bytes > u64::MAX as f64 {
        return Err(SizeParseError::new(s));
    }
    Ok(bytes.round() as u64)
}

/// Format a byte count as a human-readable string.
///
/// Exact multiples render without a fraction; everything else keeps one
/// decimal place of the largest fitting unit.
///
/// # Examples
///
/// ```
/// use plotcache::config::format_size;
///
/// assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2GB");
/// assert_eq!(format_size(2_684_354_560), "2.5GB");
/// assert_eq!(format_size(512), "512B");
/// ```
pub fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;

    if bytes >= GB {
        if bytes % GB == 0 {
            format!("{}GB", bytes / GB)
        } else {
            format!("{:.1}GB", bytes as f64 / GB as f64)
        }
    } else if bytes >= MB {
        if bytes % MB == 0 {
            format!("{}MB", bytes / MB)
        } else {
            format!("{:.1}MB", bytes as f64 / MB as f64)
        }
    } else if bytes >= KB {
        if bytes % KB == 0 {
            format!("{}KB", bytes / KB)
        } else {
            format!("{:.1}KB", bytes as f64 / KB as f64)
        }
    } else {
        format!("{bytes}B")
    }
}
