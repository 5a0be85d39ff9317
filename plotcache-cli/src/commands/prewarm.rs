//! Prewarm command - pre-render plots around a navigation position.
//!
//! Starts a full cache manager, feeds it one navigation window, and waits
//! for the render queue to drain before reporting what was cached.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;

use plotcache::config::{format_size, ConfigFile, ConfigServer, DEFAULT_SEGMENT_LENGTHS};
use plotcache::key::overlap_bp_from_percent;
use plotcache::logging::init_logging;
use plotcache::manager::CacheManager;
use plotcache::render::{BinaryFileSource, PlotRenderer, RectanglePlotRenderer, SyntheticSource};
use plotcache::scheduler::NavigationWindow;

use crate::error::CliError;

/// Arguments for the prewarm command.
#[derive(Debug, Args)]
pub struct PrewarmArgs {
    /// Source signal id
    #[arg(long)]
    pub source: u32,

    /// Segment length of the simulated view (default: largest configured length)
    #[arg(long)]
    pub length: Option<u32>,

    /// Segment index at the center of the window
    #[arg(long, default_value = "0")]
    pub center: u32,

    /// Segments to cover on each side of the center (default: prefetch.radius)
    #[arg(long)]
    pub radius: Option<u32>,

    /// Overlap percentage (default: segments.default_overlap)
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Directory of raw signal files (omit to render a synthetic signal)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Length of the synthetic signal, in samples
    #[arg(long, default_value = "1048576")]
    pub synthetic_len: u64,
}

/// Run the prewarm command.
pub async fn run(args: PrewarmArgs) -> Result<(), CliError> {
    let config_file = ConfigFile::load()?;
    let _guard = init_logging(config_file.logging.file.as_deref())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let server = Arc::new(ConfigServer::from_file(config_file));
    let snapshot = server.snapshot();

    if !snapshot.cache_enabled {
        return Err(CliError::Config(
            "Cache is disabled; set cache.enabled = true before prewarming".to_string(),
        ));
    }

    let length = match args.length {
        Some(0) => {
            return Err(CliError::Config(
                "Segment length must be at least 1 sample".to_string(),
            ))
        }
        Some(l) => l,
        None => snapshot
            .segment_lengths
            .first()
            .copied()
            .unwrap_or(DEFAULT_SEGMENT_LENGTHS[0]),
    };

    let overlap_bp = match args.overlap {
        Some(pct) => overlap_bp_from_percent(pct, snapshot.max_overlap_percent).ok_or_else(
            || {
                CliError::Config(format!(
                    "Overlap {}% is outside 0..{}%",
                    pct, snapshot.max_overlap_percent
                ))
            },
        )?,
        None => snapshot.default_overlap_bp,
    };

    let radius = args.radius.unwrap_or(snapshot.prefetch_radius);

    let renderer: Arc<dyn PlotRenderer> = match args.data_dir {
        Some(dir) => Arc::new(RectanglePlotRenderer::new(BinaryFileSource::new(dir))),
        None => Arc::new(RectanglePlotRenderer::new(SyntheticSource::new(
            args.synthetic_len,
        ))),
    };

    let manager = CacheManager::start(server, renderer)?;
    info!(
        source = args.source,
        length, center = args.center, radius, "prewarm started"
    );

    let window = NavigationWindow::new(args.source, length, args.center, radius, overlap_bp);
    let plan = manager.pregenerate(&window);

    println!(
        "Queued {} plots ({} already cached, {} attached to running jobs)",
        plan.planned, plan.already_cached, plan.attached
    );

    if plan.planned + plan.attached > 0 {
        println!(
            "Rendering with {} workers...",
            snapshot.worker_count
        );
    }

    // Queued jobs only; nothing else submits, so empty queues mean done
    loop {
        if manager.status().queues.total() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let status = manager.status();
    let stats = status.scheduler;

    println!();
    println!("Prewarm complete:");
    println!("  Rendered: {}", stats.completed);
    if stats.failed > 0 {
        println!("  Failed:   {}", stats.failed);
    }
    if let Some(avg) = stats.average_render_time {
        println!("  Average render time: {:.0}ms", avg.as_secs_f64() * 1000.0);
    }
    println!(
        "  Cache: {} plots, {} of {}",
        status.store.ready,
        format_size(status.store.size_bytes),
        format_size(status.store.capacity_bytes)
    );

    manager.shutdown().await;
    info!("prewarm finished");

    Ok(())
}
