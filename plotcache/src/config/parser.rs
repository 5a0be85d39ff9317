//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::defaults::MAX_RENDER_WORKERS;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in
/// the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("capacity") {
            config.cache.capacity = parse_size(v).map_err(|_| {
                invalid(
                    "cache",
                    "capacity",
                    v,
                    "expected format like '5GB', '2.5GB', or '500MB'",
                )
            })?;
        }
        if let Some(v) = section.get("enabled") {
            config.cache.enabled = parse_bool(v)
                .ok_or_else(|| invalid("cache", "enabled", v, "expected true or false"))?;
        }
        if let Some(v) = section.get("max_age_hours") {
            config.cache.max_age_hours = v.trim().parse().map_err(|_| {
                invalid(
                    "cache",
                    "max_age_hours",
                    v,
                    "expected a whole number of hours (0 keeps artifacts forever)",
                )
            })?;
        }
        if let Some(v) = section.get("gc_interval_secs") {
            let secs: u64 = v.trim().parse().map_err(|_| {
                invalid("cache", "gc_interval_secs", v, "expected a whole number of seconds")
            })?;
            if secs == 0 {
                return Err(invalid(
                    "cache",
                    "gc_interval_secs",
                    v,
                    "must be at least 1 second",
                ));
            }
            config.cache.gc_interval_secs = secs;
        }
    }

    // [segments] section
    if let Some(section) = ini.section(Some("segments")) {
        if let Some(v) = section.get("lengths") {
            config.segments.lengths =
                parse_lengths(v).map_err(|reason| invalid("segments", "lengths", v, &reason))?;
        }
        if let Some(v) = section.get("default_overlap") {
            config.segments.default_overlap = parse_percent(v)
                .map_err(|reason| invalid("segments", "default_overlap", v, &reason))?;
        }
        if let Some(v) = section.get("max_overlap") {
            config.segments.max_overlap = parse_percent(v)
                .map_err(|reason| invalid("segments", "max_overlap", v, &reason))?;
        }
    }
    if config.segments.max_overlap >= 100.0 {
        return Err(invalid(
            "segments",
            "max_overlap",
            &config.segments.max_overlap.to_string(),
            "must be below 100",
        ));
    }
    if config.segments.default_overlap > config.segments.max_overlap {
        return Err(invalid(
            "segments",
            "default_overlap",
            &config.segments.default_overlap.to_string(),
            "must not exceed max_overlap",
        ));
    }

    // [prefetch] section
    if let Some(section) = ini.section(Some("prefetch")) {
        if let Some(v) = section.get("radius") {
            config.prefetch.radius = v.trim().parse().map_err(|_| {
                invalid("prefetch", "radius", v, "expected a whole number of segments")
            })?;
        }
        if let Some(v) = section.get("workers") {
            let workers: usize = v
                .trim()
                .parse()
                .map_err(|_| invalid("prefetch", "workers", v, "expected a worker count"))?;
            if workers == 0 || workers > MAX_RENDER_WORKERS {
                return Err(invalid(
                    "prefetch",
                    "workers",
                    v,
                    "must be between 1 and 64",
                ));
            }
            config.prefetch.workers = workers;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = Some(expand_tilde(v));
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a comma-separated list of segment lengths, largest first.
pub(super) fn parse_lengths(v: &str) -> Result<Vec<u32>, String> {
    let mut lengths = Vec::new();
    for part in v.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let length: u32 = part
            .parse()
            .map_err(|_| format!("'{part}' is not a valid segment length"))?;
        if length == 0 {
            return Err("segment lengths must be positive".to_string());
        }
        lengths.push(length);
    }
    if lengths.is_empty() {
        return Err("at least one segment length is required".to_string());
    }
    lengths.sort_unstable_by(|a, b| b.cmp(a));
    lengths.dedup();
    Ok(lengths)
}

/// Parse a percentage, with or without a trailing `%`.
pub(super) fn parse_percent(v: &str) -> Result<f64, String> {
    let p: f64 = v
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse()
        .map_err(|_| format!("'{v}' is not a number"))?;
    if !p.is_finite() || p < 0.0 {
        return Err("must be zero or a positive percentage".to_string());
    }
    Ok(p)
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
