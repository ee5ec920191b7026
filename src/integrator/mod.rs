//! The integration orchestrator.
//!
//! [`Integrator::run`] drives the whole pipeline for one block: resolve the
//! locator, reconcile the staging cache, read the manifest, install missing
//! npm dependencies, generate files into the host project, fan out over
//! sub-blocks, inject the route entry, and append the container import.
//! Stages run strictly in order; a fatal error aborts the remaining stages
//! with no rollback of completed ones. Progress is reported through a
//! [`ProgressSink`] and the accumulated event log is part of the result.
//!
//! The orchestrator owns sequencing only. Fetching lives in `cache`, file
//! materialization in `generator`, npm work in `installer`, and host-file
//! mutation in `writer`; each is injected so tests can substitute mocks.

use anyhow::Result;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, SyncOutcome, reconcile};
use crate::constants::{COMPONENTS_DIR, COMPONENTS_INDEX_FILE, PAGES_DIR, ROUTES_FILE};
use crate::core::BlockpmError;
use crate::generator::{CodeGenerator, GenerationResult, GenerationSpec};
use crate::installer::{DependencyInstaller, InstallOptions, InstallReport, merge_requirements};
use crate::manifest::BlockManifest;
use crate::source::{BlockContext, ResolveOptions, RouteOrigin, normalize_route_path, resolve};
use crate::writer::{RouteEntry, WriteOutcome, append_import, supports_config_routes, write_route};

pub mod progress;
pub use progress::{CollectingSink, NullSink, ProgressSink, Stage, StageEvent};

/// Everything the `add` command passes into one integration run.
#[derive(Debug, Clone)]
pub struct IntegrateOptions {
    /// The block source locator (git URL or local path).
    pub locator: String,
    /// Host project root.
    pub project_dir: PathBuf,
    /// Explicit block name override.
    pub name: Option<String>,
    /// Branch override; falls back to the locator's `#fragment`.
    pub branch: Option<String>,
    /// Explicit route path. Derived from the block name when unset.
    pub route_path: Option<String>,
    /// Force page (`Some(true)`) or component (`Some(false)`) mode. The
    /// manifest decides when unset.
    pub page_override: Option<bool>,
    /// Treat the page as a layout: its route carries an empty nested-routes
    /// placeholder.
    pub layout: bool,
    /// Never touch the routes file.
    pub no_route: bool,
    /// Skip dependency installation.
    pub skip_deps: bool,
    /// Compute everything, mutate nothing.
    pub dry_run: bool,
    /// Package-manager client override.
    pub client: Option<String>,
    /// npm registry override.
    pub registry: Option<String>,
    /// Drop `locale`/`locales` directories during generation.
    pub strip_locale: bool,
    /// Requested target dialect; conversion is delegated externally.
    pub dialect: Option<String>,
    /// Sub-path inside the source repository holding the block files.
    pub source_dir: Option<String>,
    /// Dev-server port for the advisory view URL.
    pub dev_port: u16,
}

impl IntegrateOptions {
    /// Options for integrating `locator` into `project_dir` with defaults.
    #[must_use]
    pub fn new(locator: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            locator: locator.into(),
            project_dir: project_dir.into(),
            name: None,
            branch: None,
            route_path: None,
            page_override: None,
            layout: false,
            no_route: false,
            skip_deps: false,
            dry_run: false,
            client: None,
            registry: None,
            strip_locale: false,
            dialect: None,
            source_dir: None,
            dev_port: crate::constants::DEFAULT_DEV_PORT,
        }
    }
}

/// One node of the (one level deep) block tree: an acquisition context plus
/// its loaded manifest.
#[derive(Debug, Clone)]
struct BlockNode {
    context: BlockContext,
    manifest: BlockManifest,
}

/// The outcome of a completed integration.
#[derive(Debug, Clone)]
pub struct IntegrationResult {
    /// Effective block name after manifest refinement.
    pub name: String,
    /// Whether the block was integrated as a page.
    pub is_page_block: bool,
    /// How the source was obtained.
    pub sync: SyncOutcome,
    /// Dependency installation report.
    pub install: InstallReport,
    /// Primary block generation output.
    pub generated: GenerationResult,
    /// Sub-block generation outputs, in manifest order.
    pub sub_blocks: Vec<GenerationResult>,
    /// Final route path (always `/`-prefixed) and where it came from.
    pub route_path: String,
    pub route_origin: RouteOrigin,
    /// True when a route entry was written (never in dry-run).
    pub route_created: bool,
    /// True when a container import was appended (never in dry-run).
    pub container_import_added: bool,
    /// Advisory dev-server URL for page blocks.
    pub view_url: Option<String>,
    /// Ordered stage log, the same events the sink received.
    pub log: Vec<StageEvent>,
}

/// The pipeline driver, generic over its injected collaborators.
pub struct Integrator<S, I, G> {
    store: S,
    installer: I,
    generator: G,
}

impl<S, I, G> Integrator<S, I, G>
where
    S: CacheStore,
    I: DependencyInstaller,
    G: CodeGenerator,
{
    pub fn new(store: S, installer: I, generator: G) -> Self {
        Self {
            store,
            installer,
            generator,
        }
    }

    /// Runs the full pipeline for one block.
    ///
    /// Fatal stage failures are reported to the sink as `StageFailed` and
    /// returned as errors; completed stages are never rolled back.
    pub async fn run(
        &self,
        options: &IntegrateOptions,
        sink: &dyn ProgressSink,
    ) -> Result<IntegrationResult> {
        let mut log = Vec::new();
        let staging_root = self.store.staging_root();

        // Stage 1: resolve the locator into an acquisition context.
        let context = self
            .stage(&mut log, sink, Stage::Resolve, options.locator.clone(), || {
                resolve(
                    &options.locator,
                    &ResolveOptions {
                        name: options.name.clone(),
                        branch: options.branch.clone(),
                        route_path: options.route_path.clone(),
                        source_dir: options.source_dir.clone(),
                    },
                    &staging_root,
                )
            })
            .await?;

        // Stage 2: bring the source files onto disk.
        let sync_detail = if context.is_local {
            format!("local path {}", context.source_path.display())
        } else {
            crate::git::strip_auth_from_url(&context.url)
        };
        let sync = self
            .stage_async(&mut log, sink, Stage::Sync, sync_detail, async {
                reconcile(&context, &self.store).await
            })
            .await?;
        if let SyncOutcome::StaleReused { reason } = &sync {
            warn!("Repository update failed ({reason}); using the cached copy");
        }

        // Stage 3: manifest, mode detection, and the eager sub-block tree.
        let (manifest, sub_nodes) = self
            .stage(&mut log, sink, Stage::Manifest, String::new(), || {
                let manifest = BlockManifest::load(&context.source_path)?;
                let sub_nodes = build_sub_tree(&context, &manifest)?;
                Ok((manifest, sub_nodes))
            })
            .await?;

        let is_page_block = options
            .page_override
            .unwrap_or_else(|| manifest.is_page_block());
        let name = effective_name(options, &manifest, &context);
        let (route_path, route_origin) = match context.route_origin {
            RouteOrigin::Explicit => (context.route_path.clone(), RouteOrigin::Explicit),
            RouteOrigin::Derived => {
                let bare = name.rsplit('/').next().unwrap_or(&name);
                (normalize_route_path(bare), RouteOrigin::Derived)
            }
        };
        match route_origin {
            RouteOrigin::Explicit => info!("Using explicit route path {route_path}"),
            RouteOrigin::Derived => info!("Derived route path {route_path} from block name"),
        }

        // Stage 4: reconcile and install npm dependencies.
        let requirement_sets: Vec<&BTreeMap<String, String>> =
            std::iter::once(&manifest.dependencies)
                .chain(sub_nodes.iter().map(|n| &n.manifest.dependencies))
                .collect();
        let install = self
            .stage_async(&mut log, sink, Stage::Dependencies, String::new(), async {
                let merged = merge_requirements(&requirement_sets)?;
                self.installer
                    .install(
                        &options.project_dir,
                        &merged,
                        &InstallOptions {
                            client: options.client.clone(),
                            registry: options.registry.clone(),
                            dry_run: options.dry_run,
                            skip: options.skip_deps,
                        },
                    )
                    .await
            })
            .await?;

        // Stage 5: generate the primary block.
        let target_path = options.project_dir.join(if is_page_block {
            PAGES_DIR
        } else {
            COMPONENTS_DIR
        });
        let skip_dirs = sub_source_dirs(&context, &sub_nodes);
        let generation_spec = GenerationSpec {
            source_path: context.source_path.clone(),
            target_path,
            block_name: name.clone(),
            is_page_block,
            dry_run: options.dry_run,
            strip_locale: options.strip_locale,
            dialect: options.dialect.clone(),
            skip_dirs,
        };
        let generated = self
            .stage_async(&mut log, sink, Stage::Generate, name.clone(), async {
                self.generator.generate(&generation_spec).await
            })
            .await?;

        // Stage 6: sub-blocks, concurrently. A page's sub-blocks land in the
        // shared components directory; a component's nest under its folder.
        let sub_target = if is_page_block {
            options.project_dir.join(COMPONENTS_DIR)
        } else {
            generated.block_folder_path.clone()
        };
        let sub_blocks = if sub_nodes.is_empty() {
            Vec::new()
        } else {
            let detail = format!("{} sub-blocks", sub_nodes.len());
            self.stage_async(&mut log, sink, Stage::SubBlocks, detail, async {
                self.generate_sub_blocks(&sub_nodes, &sub_target, options).await
            })
            .await?
        };

        // Stage 7: route injection, page mode only.
        let routes_file = options.project_dir.join(ROUTES_FILE);
        let mut route_created = false;
        if is_page_block && !options.no_route && generated.need_create_new_route {
            if !supports_config_routes(&routes_file) {
                debug!(
                    "Host project has no {}; skipping route injection",
                    ROUTES_FILE
                );
            } else if options.dry_run {
                info!("[dry-run] would add route {route_path} to {}", ROUTES_FILE);
            } else {
                let entry = if options.layout {
                    RouteEntry::layout(&route_path, &generated.block_folder_name)
                } else {
                    RouteEntry::page(&route_path, &generated.block_folder_name)
                };
                let outcome = self
                    .stage(&mut log, sink, Stage::Route, route_path.clone(), || {
                        write_route(&entry, &routes_file)
                    })
                    .await?;
                route_created = outcome == WriteOutcome::Written;
            }
        }

        // Stage 8: container import, component mode only.
        let mut container_import_added = false;
        if !is_page_block && !options.dry_run {
            let container_file = options.project_dir.join(COMPONENTS_INDEX_FILE);
            let folder = generated.block_folder_name.clone();
            let outcome = self
                .stage(&mut log, sink, Stage::Container, folder.clone(), || {
                    append_import(&container_file, &folder)
                })
                .await?;
            container_import_added = outcome == WriteOutcome::Written;
        }

        // Stage 9: advisory view URL. Failures here must never fail the run.
        let view_url = if is_page_block {
            let url = format!("http://127.0.0.1:{}{}", options.dev_port, route_path);
            let event = StageEvent::StageSucceeded {
                stage: Stage::ViewUrl,
                detail: url.clone(),
            };
            sink.emit(&event);
            log.push(event);
            Some(url)
        } else {
            None
        };

        Ok(IntegrationResult {
            name,
            is_page_block,
            sync,
            install,
            generated,
            sub_blocks,
            route_path,
            route_origin,
            route_created,
            container_import_added,
            view_url,
            log,
        })
    }

    async fn generate_sub_blocks(
        &self,
        nodes: &[BlockNode],
        target: &Path,
        options: &IntegrateOptions,
    ) -> Result<Vec<GenerationResult>> {
        let futures = nodes.iter().map(|node| {
            let spec = GenerationSpec {
                source_path: node.context.source_path.clone(),
                target_path: target.to_path_buf(),
                block_name: node.context.name.clone(),
                // Sub-blocks are always components.
                is_page_block: false,
                dry_run: options.dry_run,
                strip_locale: options.strip_locale,
                dialect: options.dialect.clone(),
                skip_dirs: Vec::new(),
            };
            async move {
                self.generator.generate(&spec).await.map_err(|e| {
                    BlockpmError::SubBlockGenerationFailed {
                        block: node.context.name.clone(),
                        reason: e.to_string(),
                    }
                })
            }
        });

        let mut results = Vec::with_capacity(nodes.len());
        for outcome in join_all(futures).await {
            results.push(outcome?);
        }
        Ok(results)
    }

    /// Runs a synchronous stage body with start/success/failure events.
    async fn stage<T>(
        &self,
        log: &mut Vec<StageEvent>,
        sink: &dyn ProgressSink,
        stage: Stage,
        detail: String,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        self.stage_async(log, sink, stage, detail, async { body() })
            .await
    }

    async fn stage_async<T>(
        &self,
        log: &mut Vec<StageEvent>,
        sink: &dyn ProgressSink,
        stage: Stage,
        detail: String,
        body: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = StageEvent::StageStarted {
            stage,
            detail: detail.clone(),
        };
        sink.emit(&started);
        log.push(started);

        match body.await {
            Ok(value) => {
                let done = StageEvent::StageSucceeded { stage, detail };
                sink.emit(&done);
                log.push(done);
                Ok(value)
            }
            Err(e) => {
                let failed = StageEvent::StageFailed {
                    stage,
                    error: e.to_string(),
                };
                sink.emit(&failed);
                log.push(failed);
                Err(e)
            }
        }
    }
}

/// The block name used for folder naming: explicit override, else the
/// manifest name, else the name derived from the locator.
fn effective_name(
    options: &IntegrateOptions,
    manifest: &BlockManifest,
    context: &BlockContext,
) -> String {
    if let Some(name) = &options.name {
        return name.clone();
    }
    if !manifest.name.is_empty() {
        return manifest.name.clone();
    }
    context.name.clone()
}

/// Builds the one-level-deep sub-block tree eagerly.
///
/// Each sub-block derives its context from the parent's already-synced
/// source tree and must carry its own manifest. Deeper nesting declared by
/// a sub-block is ignored.
fn build_sub_tree(parent: &BlockContext, manifest: &BlockManifest) -> Result<Vec<BlockNode>> {
    let mut nodes = Vec::new();
    for locator in manifest.sub_blocks() {
        let context = parent.derive_sub_block(locator);
        let manifest = BlockManifest::load(&context.source_path).map_err(|e| {
            BlockpmError::SubBlockGenerationFailed {
                block: context.name.clone(),
                reason: e.to_string(),
            }
        })?;
        nodes.push(BlockNode { context, manifest });
    }
    Ok(nodes)
}

/// Source-relative directories of sub-blocks, excluded from the parent's
/// copy so each sub-block is materialized exactly once.
fn sub_source_dirs(parent: &BlockContext, nodes: &[BlockNode]) -> Vec<PathBuf> {
    nodes
        .iter()
        .filter_map(|node| {
            node.context
                .source_path
                .strip_prefix(&parent.source_path)
                .ok()
                .map(Path::to_path_buf)
        })
        .collect()
}
