//! The `cache` command: inspect and clear the staging cache.
//!
//! Remote block sources are staged under `~/.blockpm/cache` and reused
//! across runs. Clearing a slot (or everything) forces a clean clone on the
//! next `add`, which is the recovery path when a cached repository is
//! corrupted or permanently stale.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::cache::Cache;

#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    /// Show the cache location, slot list, and total size
    Info,
    /// Remove a cached source, or everything with --all
    Clean {
        /// Slot to remove (as shown by `cache info`)
        source_id: Option<String>,
        /// Remove the entire cache
        #[arg(long, conflicts_with = "source_id")]
        all: bool,
    },
}

impl CacheCommand {
    pub async fn execute(self) -> Result<()> {
        let cache = Cache::new()?;
        match self.command {
            CacheSubcommand::Info => {
                let slots = cache.list_slots()?;
                println!("Cache directory: {}", cache.root().display());
                println!("Cached sources:  {}", slots.len());
                for slot in &slots {
                    println!("  {slot}");
                }
                println!("Total size:      {}", format_size(cache.size()?));
                Ok(())
            }
            CacheSubcommand::Clean { source_id, all } => {
                if all {
                    cache.clean(None)?;
                    println!("{} Cache cleared", "✓".green());
                } else if let Some(id) = source_id {
                    cache.clean(Some(&id))?;
                    println!("{} Removed cached source '{id}'", "✓".green());
                } else {
                    anyhow::bail!("specify a source id to remove, or --all for everything");
                }
                Ok(())
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
