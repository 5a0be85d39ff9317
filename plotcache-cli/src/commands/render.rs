//! Render command - draw a single segment plot to a file.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use plotcache::config::{format_size, ConfigFile};
use plotcache::key::{overlap_bp_from_percent, SegmentKey};
use plotcache::render::{BinaryFileSource, PlotRenderer, RectanglePlotRenderer, SyntheticSource};

use crate::error::CliError;

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Source signal id
    #[arg(long)]
    pub source: u32,

    /// Segment length in samples
    #[arg(long)]
    pub length: u32,

    /// Segment index
    #[arg(long, default_value = "0")]
    pub index: u32,

    /// Overlap between consecutive segments, as a percentage
    #[arg(long, default_value = "0")]
    pub overlap: f64,

    /// Directory of raw signal files (omit to render a synthetic signal)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Length of the synthetic signal, in samples
    #[arg(long, default_value = "1048576")]
    pub synthetic_len: u64,

    /// Output file path
    #[arg(long)]
    pub output: PathBuf,
}

/// Run the render command.
pub fn run(args: RenderArgs) -> Result<(), CliError> {
    if args.length == 0 {
        return Err(CliError::Config(
            "Segment length must be at least 1 sample".to_string(),
        ));
    }

    let config = ConfigFile::load().unwrap_or_default();
    let overlap_bp =
        overlap_bp_from_percent(args.overlap, config.segments.max_overlap).ok_or_else(|| {
            CliError::Config(format!(
                "Overlap {}% is outside 0..{}%",
                args.overlap, config.segments.max_overlap
            ))
        })?;

    let key = SegmentKey::new(args.source, args.length, args.index, overlap_bp);

    println!("Rendering plot for:");
    println!("  Source:  {}", args.source);
    println!(
        "  Segment: index {} at {} samples, {}% overlap",
        args.index, args.length, args.overlap
    );
    println!();

    let start = Instant::now();
    let bytes = match args.data_dir {
        Some(dir) => RectanglePlotRenderer::new(BinaryFileSource::new(dir))
            .render(&key)
            .map_err(CliError::Render)?,
        None => RectanglePlotRenderer::new(SyntheticSource::new(args.synthetic_len))
            .render(&key)
            .map_err(CliError::Render)?,
    };
    let elapsed = start.elapsed();

    std::fs::write(&args.output, &bytes).map_err(|error| CliError::FileWrite {
        path: args.output.display().to_string(),
        error,
    })?;

    println!(
        "✓ Saved {} ({}, rendered in {:.2}s)",
        args.output.display(),
        format_size(bytes.len() as u64),
        elapsed.as_secs_f64()
    );

    Ok(())
}
