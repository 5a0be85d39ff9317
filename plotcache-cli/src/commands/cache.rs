//! Cache management CLI commands.

use clap::Subcommand;
use plotcache::config::{format_size, ConfigFile};
use plotcache::store::{clear_store_dir, store_dir_stats};

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Clear cached plot artifacts
    Clear {
        /// Only clear plots for this source id
        #[arg(long)]
        source: Option<u32>,
    },
    /// Show plot cache statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let cache_dir = &config.cache.directory;

    match action {
        CacheAction::Clear { source } => {
            match source {
                Some(id) => println!(
                    "Clearing plots for source {} at: {}",
                    id,
                    cache_dir.display()
                ),
                None => println!("Clearing plot cache at: {}", cache_dir.display()),
            }

            match clear_store_dir(cache_dir, source) {
                Ok(result) => {
                    println!(
                        "Deleted {} files, freed {}",
                        result.files_deleted,
                        format_size(result.bytes_freed)
                    );
                    Ok(())
                }
                Err(e) => Err(CliError::Cache(e.to_string())),
            }
        }
        CacheAction::Stats => {
            println!("Plot cache: {}", cache_dir.display());

            match store_dir_stats(cache_dir) {
                Ok((files, bytes)) => {
                    println!("  Files:    {}", files);
                    println!("  Size:     {}", format_size(bytes));
                    println!("  Capacity: {}", format_size(config.cache.capacity));
                    Ok(())
                }
                Err(e) => Err(CliError::Cache(e.to_string())),
            }
        }
    }
}
