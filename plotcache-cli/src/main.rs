//! plotcache command-line interface.
//!
//! Renders segment plots, pre-fills the artifact cache around a
//! navigation position, and manages the cache directory and the
//! configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};

use commands::{cache, config, prewarm, render};

#[derive(Parser)]
#[command(name = "plotcache", version = plotcache::VERSION)]
#[command(about = "Render and cache segment plots for signal review", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the on-disk plot cache
    Cache {
        #[command(subcommand)]
        action: cache::CacheAction,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigCommands,
    },

    /// Render a single segment plot to a file
    Render(render::RenderArgs),

    /// Pre-render plots around a navigation position
    Prewarm(prewarm::PrewarmArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Cache { action } => cache::run(action),
        Commands::Config { action } => config::run(action),
        Commands::Render(args) => render::run(args),
        Commands::Prewarm(args) => prewarm::run(args).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}
