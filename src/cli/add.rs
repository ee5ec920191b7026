//! The `add` command: integrate a block into the host project.
//!
//! ```bash
//! blockpm add https://github.com/org/user-landing.git
//! blockpm add ./local-blocks/fancy-card --component
//! blockpm add https://github.com/org/admin.git#dev --path /admin --layout
//! blockpm add https://github.com/org/blk.git --dry-run
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::cache::{Cache, SyncOutcome};
use crate::config::GlobalConfig;
use crate::constants::DEFAULT_DEV_PORT;
use crate::generator::ScaffoldGenerator;
use crate::installer::PackageInstaller;
use crate::integrator::{
    IntegrateOptions, IntegrationResult, Integrator, ProgressSink, StageEvent,
};
use crate::utils::progress::ProgressBar;

/// Command-line arguments for `blockpm add`.
#[derive(Args, Debug)]
pub struct AddCommand {
    /// Block source: a git URL (with optional `#branch`) or a local path
    locator: String,

    /// Block name override (defaults to the manifest name)
    #[arg(long)]
    name: Option<String>,

    /// Branch to check out (overrides the locator's `#fragment`)
    #[arg(short, long)]
    branch: Option<String>,

    /// Route path for page blocks (defaults to one derived from the name)
    #[arg(short, long)]
    path: Option<String>,

    /// Force page mode regardless of the manifest
    #[arg(long, conflicts_with = "component")]
    page: bool,

    /// Force component mode regardless of the manifest
    #[arg(long)]
    component: bool,

    /// Treat the page as a layout (its route gets an empty nested-routes list)
    #[arg(long, requires = "page")]
    layout: bool,

    /// Do not write a route entry
    #[arg(long)]
    no_route: bool,

    /// Skip npm dependency installation
    #[arg(long)]
    no_deps: bool,

    /// Compute and report everything without writing to the project
    #[arg(long)]
    dry_run: bool,

    /// Package-manager client to use (npm, pnpm, yarn)
    #[arg(long)]
    client: Option<String>,

    /// npm registry URL
    #[arg(long)]
    registry: Option<String>,

    /// Skip `locale`/`locales` directories when copying block files
    #[arg(long)]
    strip_locale: bool,

    /// Target dialect (js or ts); conversion is delegated to external tooling
    #[arg(long)]
    dialect: Option<String>,

    /// Sub-path inside the source repository where the block files live
    #[arg(long)]
    source_dir: Option<String>,
}

/// Drives the CLI spinner from pipeline events.
struct SpinnerSink {
    bar: ProgressBar,
}

impl SpinnerSink {
    fn new() -> Self {
        Self {
            bar: ProgressBar::new_spinner(),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for SpinnerSink {
    fn emit(&self, event: &StageEvent) {
        self.bar.set_message(event.to_string());
    }
}

impl AddCommand {
    /// Executes the command against `project_dir` (defaults to the current
    /// directory).
    pub async fn execute_from_project(self, project_dir: Option<PathBuf>) -> Result<()> {
        let project_dir = match project_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        let config = GlobalConfig::load().await?;

        let options = IntegrateOptions {
            locator: self.locator.clone(),
            project_dir,
            name: self.name,
            branch: self.branch,
            route_path: self.path,
            page_override: if self.page {
                Some(true)
            } else if self.component {
                Some(false)
            } else {
                None
            },
            layout: self.layout,
            no_route: self.no_route,
            skip_deps: self.no_deps,
            dry_run: self.dry_run,
            client: self.client.or(config.client),
            registry: self.registry.or(config.registry),
            strip_locale: self.strip_locale,
            dialect: self.dialect,
            source_dir: self.source_dir.or(config.source_dir),
            dev_port: if config.dev_port == 0 {
                DEFAULT_DEV_PORT
            } else {
                config.dev_port
            },
        };

        let integrator = Integrator::new(
            Cache::new()?,
            PackageInstaller::new(),
            ScaffoldGenerator::new(),
        );

        let sink = SpinnerSink::new();
        let outcome = integrator.run(&options, &sink).await;
        sink.finish();

        let result = outcome?;
        print_summary(&result, options.dry_run);
        Ok(())
    }
}

fn print_summary(result: &IntegrationResult, dry_run: bool) {
    let kind = if result.is_page_block { "page" } else { "component" };
    if dry_run {
        println!(
            "{} {} block '{}' would generate {} file(s) under {}",
            "[dry-run]".yellow(),
            kind,
            result.name.bold(),
            result.generated.generated_paths.len(),
            result.generated.block_folder_path.display()
        );
    } else {
        println!(
            "{} Added {} block '{}' ({} file(s) in {})",
            "✓".green(),
            kind,
            result.name.bold(),
            result.generated.generated_paths.len(),
            result.generated.block_folder_path.display()
        );
    }

    if let SyncOutcome::StaleReused { reason } = &result.sync {
        println!(
            "{} Repository update failed ({reason}); reused the cached copy",
            "⚠".yellow()
        );
    }

    if !result.sub_blocks.is_empty() {
        println!("  {} sub-block(s):", result.sub_blocks.len());
        for sub in &result.sub_blocks {
            println!("    - {}", sub.block_folder_name);
        }
    }

    if !result.install.installed.is_empty() {
        let verb = if dry_run { "would install" } else { "installed" };
        println!("  {verb}: {}", result.install.installed.join(", "));
    }

    if result.route_created {
        println!("  route {} added", result.route_path.cyan());
    }
    if result.container_import_added {
        println!(
            "  export added to the component index for {}",
            result.generated.block_folder_name
        );
    }
    if let Some(url) = &result.view_url {
        println!("  probably visible at {}", url.underline());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        cmd: AddCommand,
    }

    #[test]
    fn test_page_and_component_conflict() {
        let result =
            TestCli::try_parse_from(["add", "https://github.com/o/r.git", "--page", "--component"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_layout_requires_page() {
        let result = TestCli::try_parse_from(["add", "https://github.com/o/r.git", "--layout"]);
        assert!(result.is_err());

        let result =
            TestCli::try_parse_from(["add", "https://github.com/o/r.git", "--page", "--layout"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["add", "./blocks/card"]).unwrap();
        assert_eq!(cli.cmd.locator, "./blocks/card");
        assert!(!cli.cmd.dry_run);
        assert!(cli.cmd.path.is_none());
    }
}
