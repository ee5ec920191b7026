//! Command-line interface for blockpm.
//!
//! Two subcommands:
//! - `add` - integrate a block (the whole acquisition pipeline)
//! - `cache` - inspect or clear the staging cache
//!
//! Global flags (`--verbose`, `--quiet`, `--no-progress`, `--config`,
//! `--project`) are available on every subcommand. Flags are translated
//! into a [`CliConfig`] and applied to the process environment once, at the
//! start of execution, so tests can inject a configuration without parsing
//! arguments.

mod add;
mod cache;

pub use add::AddCommand;
pub use cache::CacheCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runtime configuration derived from the global flags.
///
/// Holding these in a struct instead of writing environment variables
/// during parsing keeps CLI construction side-effect free and lets tests
/// compose configurations directly.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Value for `RUST_LOG` (`None` preserves the inherited filter).
    pub log_level: Option<String>,
    /// Disable spinners (`BLOCKPM_NO_PROGRESS=1`).
    pub no_progress: bool,
    /// Override the global config file (`BLOCKPM_CONFIG`).
    pub config_path: Option<String>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the configuration to the process environment.
    ///
    /// Must run on the main thread before any worker threads spawn;
    /// mutating the environment is unsafe once other threads may read it.
    pub fn apply_to_env(&self) {
        if let Some(level) = &self.log_level {
            unsafe { std::env::set_var("RUST_LOG", level) };
        }
        if self.no_progress {
            unsafe { std::env::set_var("BLOCKPM_NO_PROGRESS", "1") };
        }
        if let Some(path) = &self.config_path {
            unsafe { std::env::set_var("BLOCKPM_CONFIG", path) };
        }
    }
}

/// Top-level CLI for blockpm.
#[derive(Parser)]
#[command(
    name = "blockpm",
    about = "Integrate reusable front-end code blocks into a project",
    version,
    author,
    long_about = "blockpm fetches a code block from a git repository or local path, \
installs its npm dependencies, generates its files into the host project, and wires \
it up with a route entry and container import."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a custom global config file (default: ~/.blockpm/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Host project directory (default: current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Disable spinners and animated output
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Integrate a block into the host project
    Add(AddCommand),
    /// Inspect or clear the staging cache
    Cache(CacheCommand),
}

impl Cli {
    /// Executes with a config built from the parsed flags.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translates the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Executes with an injected configuration. The single execution path
    /// all entry points funnel through.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();

        match self.command {
            Commands::Add(cmd) => cmd.execute_from_project(self.project).await,
            Commands::Cache(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_sets_debug_level() {
        let cli = Cli::try_parse_from(["blockpm", "--verbose", "cache", "info"]).unwrap();
        let config = cli.build_config();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(!config.no_progress);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["blockpm", "-v", "-q", "cache", "info"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blockpm",
            "add",
            "https://github.com/o/r.git",
            "--no-progress",
            "--config",
            "/tmp/cfg.toml",
        ])
        .unwrap();
        let config = cli.build_config();
        assert!(config.no_progress);
        assert_eq!(config.config_path.as_deref(), Some("/tmp/cfg.toml"));
    }
}
