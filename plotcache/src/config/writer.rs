//! INI writing logic for converting `ConfigFile` → string.
//!
//! Produces a fully commented config file so a fresh install documents
//! itself. Comments use the `; ` INI convention.

use super::settings::ConfigFile;
use super::size::format_size;

/// Render a `ConfigFile` as a commented INI string.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let lengths = config
        .segments
        .lengths
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let log_file = config
        .logging
        .file
        .as_ref()
        .map(|p| format!("file = {}", p.display()))
        .unwrap_or_else(|| "; file = ~/.plotcache/plotcache.log".to_string());

    format!(
        r#"; plotcache configuration
;
; Edit values and restart, or run `plotcache config set <key> <value>`.
; Sizes accept KB/MB/GB suffixes. Overlaps are percentages.

[cache]
; Directory where rendered segment plots are kept.
directory = {directory}
; Total disk budget for the artifact store. Oldest plots are evicted
; once the budget is exceeded.
capacity = {capacity}
; Set to false to render every request inline without touching disk.
enabled = {enabled}
; Artifacts older than this are removed by the maintenance sweep.
; 0 keeps artifacts until evicted for space.
max_age_hours = {max_age_hours}
; How often the maintenance sweep runs.
gc_interval_secs = {gc_interval_secs}

[segments]
; Segment lengths (in samples) the review tool can display, largest
; first. Pre-generation plans a window for every length listed here.
lengths = {lengths}
; Overlap between consecutive segments as a percentage of the
; segment length.
default_overlap = {default_overlap:.1}
; Upper bound the UI may request.
max_overlap = {max_overlap:.1}

[prefetch]
; Segments pre-rendered on each side of the navigation position.
radius = {radius}
; Background render workers. Interactive requests always jump the queue.
workers = {workers}

[logging]
; Optional log file. Leave commented to log to stdout only.
{log_file}
"#,
        directory = config.cache.directory.display(),
        capacity = format_size(config.cache.capacity),
        enabled = config.cache.enabled,
        max_age_hours = config.cache.max_age_hours,
        gc_interval_secs = config.cache.gc_interval_secs,
        lengths = lengths,
        default_overlap = config.segments.default_overlap,
        max_overlap = config.segments.max_overlap,
        radius = config.prefetch.radius,
        workers = config.prefetch.workers,
        log_file = log_file,
    )
}
