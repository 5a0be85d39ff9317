//! Configuration key access and validation.
//!
//! This module provides a type-safe interface for getting and setting
//! configuration values by key name, with validation via the Specification Pattern.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use super::defaults::MAX_RENDER_WORKERS;
use super::file::ConfigFile;
use super::size::{format_size, parse_size};

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
///
/// Each key maps to a specific field in [`ConfigFile`] and knows how to
/// get and set its value with proper validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Cache settings
    CacheDirectory,
    CacheCapacity,
    CacheEnabled,
    CacheMaxAgeHours,
    CacheGcIntervalSecs,

    // Segment settings
    SegmentsLengths,
    SegmentsDefaultOverlap,
    SegmentsMaxOverlap,

    // Prefetch settings
    PrefetchRadius,
    PrefetchWorkers,

    // Logging settings
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cache.directory" => Ok(ConfigKey::CacheDirectory),
            "cache.capacity" => Ok(ConfigKey::CacheCapacity),
            "cache.enabled" => Ok(ConfigKey::CacheEnabled),
            "cache.max_age_hours" => Ok(ConfigKey::CacheMaxAgeHours),
            "cache.gc_interval_secs" => Ok(ConfigKey::CacheGcIntervalSecs),

            "segments.lengths" => Ok(ConfigKey::SegmentsLengths),
            "segments.default_overlap" => Ok(ConfigKey::SegmentsDefaultOverlap),
            "segments.max_overlap" => Ok(ConfigKey::SegmentsMaxOverlap),

            "prefetch.radius" => Ok(ConfigKey::PrefetchRadius),
            "prefetch.workers" => Ok(ConfigKey::PrefetchWorkers),

            "logging.file" => Ok(ConfigKey::LoggingFile),

            _ => Err(ConfigKeyError::UnknownKey(s.to_string())),
        }
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "segments.lengths").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::CacheDirectory => "cache.directory",
            ConfigKey::CacheCapacity => "cache.capacity",
            ConfigKey::CacheEnabled => "cache.enabled",
            ConfigKey::CacheMaxAgeHours => "cache.max_age_hours",
            ConfigKey::CacheGcIntervalSecs => "cache.gc_interval_secs",
            ConfigKey::SegmentsLengths => "segments.lengths",
            ConfigKey::SegmentsDefaultOverlap => "segments.default_overlap",
            ConfigKey::SegmentsMaxOverlap => "segments.max_overlap",
            ConfigKey::PrefetchRadius => "prefetch.radius",
            ConfigKey::PrefetchWorkers => "prefetch.workers",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "segments").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "lengths").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::CacheDirectory => path_to_display(&config.cache.directory),
            ConfigKey::CacheCapacity => format_size(config.cache.capacity),
            ConfigKey::CacheEnabled => config.cache.enabled.to_string(),
            ConfigKey::CacheMaxAgeHours => config.cache.max_age_hours.to_string(),
            ConfigKey::CacheGcIntervalSecs => config.cache.gc_interval_secs.to_string(),
            ConfigKey::SegmentsLengths => config
                .segments
                .lengths
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            ConfigKey::SegmentsDefaultOverlap => config.segments.default_overlap.to_string(),
            ConfigKey::SegmentsMaxOverlap => config.segments.max_overlap.to_string(),
            ConfigKey::PrefetchRadius => config.prefetch.radius.to_string(),
            ConfigKey::PrefetchWorkers => config.prefetch.workers.to_string(),
            ConfigKey::LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| path_to_display(p))
                .unwrap_or_default(),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        self.validate(value)?;
        match self {
            ConfigKey::SegmentsDefaultOverlap => {
                // Validation ensures the parse won't panic
                let v = super::parser::parse_percent(value).unwrap();
                if v > config.segments.max_overlap {
                    return Err(ConfigKeyError::ValidationFailed {
                        key: self.name().to_string(),
                        reason: format!(
                            "must not exceed max_overlap ({:.1})",
                            config.segments.max_overlap
                        ),
                    });
                }
            }
            ConfigKey::SegmentsMaxOverlap => {
                let v = super::parser::parse_percent(value).unwrap();
                if v < config.segments.default_overlap {
                    return Err(ConfigKeyError::ValidationFailed {
                        key: self.name().to_string(),
                        reason: format!(
                            "must not be below default_overlap ({:.1})",
                            config.segments.default_overlap
                        ),
                    });
                }
            }
            _ => {}
        }
        self.set_unchecked(config, value);
        Ok(())
    }

    /// Set the value without validation. Use `set()` for validated setting.
    fn set_unchecked(&self, config: &mut ConfigFile, value: &str) {
        match self {
            ConfigKey::CacheDirectory => {
                config.cache.directory = expand_tilde(value);
            }
            ConfigKey::CacheCapacity => {
                // Validation ensures this won't panic
                config.cache.capacity = parse_size(value).unwrap();
            }
            ConfigKey::CacheEnabled => {
                let v = value.to_lowercase();
                config.cache.enabled = v == "true" || v == "1" || v == "yes" || v == "on";
            }
            ConfigKey::CacheMaxAgeHours => {
                config.cache.max_age_hours = value.trim().parse().unwrap();
            }
            ConfigKey::CacheGcIntervalSecs => {
                config.cache.gc_interval_secs = value.trim().parse().unwrap();
            }
            ConfigKey::SegmentsLengths => {
                config.segments.lengths = super::parser::parse_lengths(value).unwrap();
            }
            ConfigKey::SegmentsDefaultOverlap => {
                config.segments.default_overlap = super::parser::parse_percent(value).unwrap();
            }
            ConfigKey::SegmentsMaxOverlap => {
                config.segments.max_overlap = super::parser::parse_percent(value).unwrap();
            }
            ConfigKey::PrefetchRadius => {
                config.prefetch.radius = value.trim().parse().unwrap();
            }
            ConfigKey::PrefetchWorkers => {
                config.prefetch.workers = value.trim().parse().unwrap();
            }
            ConfigKey::LoggingFile => {
                config.logging.file = optional_path(value);
            }
        }
    }

    /// Validate a value according to this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    /// Get the validation specification for this key.
    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::CacheDirectory => Box::new(PathSpec),
            ConfigKey::CacheCapacity => Box::new(SizeSpec),
            ConfigKey::CacheEnabled => Box::new(BooleanSpec),
            ConfigKey::CacheMaxAgeHours => Box::new(IntegerSpec),
            ConfigKey::CacheGcIntervalSecs => Box::new(NonZeroIntegerSpec),
            ConfigKey::SegmentsLengths => Box::new(LengthListSpec),
            ConfigKey::SegmentsDefaultOverlap => Box::new(PercentSpec),
            ConfigKey::SegmentsMaxOverlap => Box::new(PercentSpec),
            ConfigKey::PrefetchRadius => Box::new(IntegerSpec),
            ConfigKey::PrefetchWorkers => Box::new(RangeSpec {
                min: 1,
                max: MAX_RENDER_WORKERS as u64,
            }),
            ConfigKey::LoggingFile => Box::new(OptionalPathSpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::CacheDirectory,
            ConfigKey::CacheCapacity,
            ConfigKey::CacheEnabled,
            ConfigKey::CacheMaxAgeHours,
            ConfigKey::CacheGcIntervalSecs,
            ConfigKey::SegmentsLengths,
            ConfigKey::SegmentsDefaultOverlap,
            ConfigKey::SegmentsMaxOverlap,
            ConfigKey::PrefetchRadius,
            ConfigKey::PrefetchWorkers,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications (Specification Pattern)
// ============================================================================

/// Trait for value validation specifications.
trait ValueSpecification {
    /// Check if the value satisfies this specification.
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

/// Specification for size values (e.g., "5GB", "500MB").
struct SizeSpec;

impl ValueSpecification for SizeSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        parse_size(value)
            .map(|_| ())
            .map_err(|_| "must be a size like '5GB', '500MB', or '1024KB'".to_string())
    }
}

/// Specification for whole-number values (zero allowed).
struct IntegerSpec;

impl ValueSpecification for IntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .trim()
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| "must be a whole number".to_string())
    }
}

/// Specification for integers that must be at least 1.
struct NonZeroIntegerSpec;

impl ValueSpecification for NonZeroIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

/// Specification for integers within an inclusive range.
struct RangeSpec {
    min: u64,
    max: u64,
}

impl ValueSpecification for RangeSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.trim().parse::<u64>() {
            Ok(n) if n >= self.min && n <= self.max => Ok(()),
            _ => Err(format!("must be an integer between {} and {}", self.min, self.max)),
        }
    }
}

/// Specification for percentage values (0 inclusive to 100 exclusive).
struct PercentSpec;

impl ValueSpecification for PercentSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let p = super::parser::parse_percent(value)?;
        if p >= 100.0 {
            return Err("must be below 100".to_string());
        }
        Ok(())
    }
}

/// Specification for comma-separated segment length lists.
struct LengthListSpec;

impl ValueSpecification for LengthListSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        super::parser::parse_lengths(value).map(|_| ())
    }
}

/// Specification for boolean values.
struct BooleanSpec;

impl ValueSpecification for BooleanSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let lower = value.to_lowercase();
        let valid = ["true", "false", "yes", "no", "1", "0", "on", "off"];
        if valid.contains(&lower.as_str()) {
            Ok(())
        } else {
            Err("must be true/false, yes/no, 1/0, or on/off".to_string())
        }
    }
}

/// Specification for path values (non-empty).
struct PathSpec;

impl ValueSpecification for PathSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err("must be a valid path".to_string())
        } else {
            Ok(())
        }
    }
}

/// Specification for optional path values (empty allowed).
struct OptionalPathSpec;

impl ValueSpecification for OptionalPathSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        // Empty is allowed for optional paths
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Expand ~ to home directory in paths.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Convert path to display string, collapsing home dir to ~.
fn path_to_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

/// Convert empty string to None, non-empty to Some path with tilde expansion.
fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(expand_tilde(value))
    }
}
