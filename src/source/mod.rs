//! Block source resolution.
//!
//! A block is identified by a *locator*: either a git URL (HTTPS, SSH, or
//! `file://`) or a local filesystem path. Resolution turns a locator plus
//! caller options into a [`BlockContext`], the immutable acquisition context
//! every later stage reads from. Resolution itself performs no I/O beyond
//! directory existence checks; cloning and updating belong to the cache
//! layer.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::core::BlockpmError;
use crate::git::parse_git_url;

/// Caller-supplied knobs that influence resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Explicit block name; defaults to the repository or directory name.
    pub name: Option<String>,
    /// Branch to check out. Overrides a `#fragment` on the locator.
    pub branch: Option<String>,
    /// Explicit route path. Normalized to a leading `/`.
    pub route_path: Option<String>,
    /// Sub-path inside the source repository where the block files live.
    pub source_dir: Option<String>,
}

/// Where the resolved route path came from, reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOrigin {
    /// The user passed an explicit route path.
    Explicit,
    /// The route path was derived from the block name.
    Derived,
}

/// The acquisition context for one block integration.
///
/// Built once per invocation and treated as immutable afterwards. Remote
/// fields (`source_id`, `staging_dir`, `branch`) are `None` for local
/// sources; `source_path` is always set.
#[derive(Debug, Clone)]
pub struct BlockContext {
    /// The locator as given by the user, fragment included.
    pub locator: String,
    /// Clone URL with the branch fragment stripped. Equals `locator` for
    /// local sources.
    pub url: String,
    /// Block name used for folder naming and route derivation.
    pub name: String,
    /// True when the locator is a local filesystem path. Local sources
    /// bypass git and the staging cache entirely.
    pub is_local: bool,
    /// Deterministic cache slot identifier (`owner-repo[-branch]`).
    pub source_id: Option<String>,
    /// Branch to check out after clone/fetch.
    pub branch: Option<String>,
    /// The cache slot directory (`staging_root/source_id`).
    pub staging_dir: Option<PathBuf>,
    /// Where the block's files are expected after reconciliation.
    pub source_path: PathBuf,
    /// Parent directory of a local source, recorded for diagnostics.
    pub parent_dir: Option<PathBuf>,
    /// Whether the staging slot already existed at resolve time.
    pub repo_exists: bool,
    /// Route path for page blocks. Always `/`-prefixed.
    pub route_path: String,
    /// Whether `route_path` was explicit or derived from the name.
    pub route_origin: RouteOrigin,
}

/// Returns true when the locator is a git URL rather than a local path.
#[must_use]
pub fn is_git_locator(locator: &str) -> bool {
    locator.starts_with("https://")
        || locator.starts_with("http://")
        || locator.starts_with("git://")
        || locator.starts_with("ssh://")
        || locator.starts_with("file://")
        || (locator.contains('@') && locator.contains(':') && !Path::new(locator).exists())
}

/// Normalizes a route path to carry exactly one leading `/`.
///
/// `"demo"`, `"/demo"`, and `"//demo"` all normalize to `"/demo"`.
#[must_use]
pub fn normalize_route_path(path: &str) -> String {
    let trimmed = path.trim().trim_start_matches('/');
    format!("/{trimmed}")
}

/// Resolves a locator into a [`BlockContext`].
///
/// `staging_root` is the shared cache directory remote sources are staged
/// under. Local-path locators never touch it.
///
/// # Errors
///
/// Returns [`BlockpmError::InvalidSource`] for empty locators and git URLs
/// that cannot be reduced to an owner and repository name.
pub fn resolve(
    locator: &str,
    options: &ResolveOptions,
    staging_root: &Path,
) -> Result<BlockContext> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(BlockpmError::InvalidSource {
            locator: locator.to_string(),
            reason: "locator is empty".to_string(),
        }
        .into());
    }

    if is_git_locator(locator) {
        resolve_git(locator, options, staging_root)
    } else {
        resolve_local(locator, options)
    }
}

fn resolve_git(
    locator: &str,
    options: &ResolveOptions,
    staging_root: &Path,
) -> Result<BlockContext> {
    // A `#fragment` on the locator names a branch; an explicit option wins.
    let (url, fragment) = match locator.split_once('#') {
        Some((url, frag)) if !frag.is_empty() => (url, Some(frag.to_string())),
        _ => (locator, None),
    };
    let branch = options.branch.clone().or(fragment);

    let (owner, repo) = parse_git_url(url).map_err(|e| BlockpmError::InvalidSource {
        locator: locator.to_string(),
        reason: e.to_string(),
    })?;

    let source_id = match &branch {
        Some(b) => format!("{owner}-{repo}-{}", b.replace('/', "-")),
        None => format!("{owner}-{repo}"),
    };

    let staging_dir = staging_root.join(&source_id);
    let source_path = match &options.source_dir {
        Some(sub) => staging_dir.join(sub),
        None => staging_dir.clone(),
    };

    let name = options.name.clone().unwrap_or_else(|| repo.clone());
    let (route_path, route_origin) = resolve_route(options, &name);

    Ok(BlockContext {
        locator: locator.to_string(),
        url: url.to_string(),
        name,
        is_local: false,
        source_id: Some(source_id),
        branch,
        repo_exists: staging_dir.exists(),
        staging_dir: Some(staging_dir),
        source_path,
        parent_dir: None,
        route_path,
        route_origin,
    })
}

fn resolve_local(locator: &str, options: &ResolveOptions) -> Result<BlockContext> {
    let expanded = shellexpand::tilde(locator).into_owned();
    let absolute = std::path::absolute(&expanded)?;

    let source_path = match &options.source_dir {
        Some(sub) => absolute.join(sub),
        None => absolute.clone(),
    };

    let name = options.name.clone().unwrap_or_else(|| {
        absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "block".to_string())
    });
    let (route_path, route_origin) = resolve_route(options, &name);

    Ok(BlockContext {
        locator: locator.to_string(),
        url: locator.to_string(),
        name,
        is_local: true,
        source_id: None,
        branch: None,
        staging_dir: None,
        parent_dir: absolute.parent().map(Path::to_path_buf),
        repo_exists: source_path.exists(),
        source_path,
        route_path,
        route_origin,
    })
}

fn resolve_route(options: &ResolveOptions, name: &str) -> (String, RouteOrigin) {
    match &options.route_path {
        Some(explicit) => (normalize_route_path(explicit), RouteOrigin::Explicit),
        None => {
            // Scoped names (`@scope/block`) derive from the bare block name.
            let bare = name.rsplit('/').next().unwrap_or(name);
            (normalize_route_path(bare), RouteOrigin::Derived)
        }
    }
}

impl BlockContext {
    /// Derives a sub-block context from this (already reconciled) parent.
    ///
    /// Sub-block locators are paths relative to the parent's source tree,
    /// and the sub-block's name is the locator's final path segment
    /// (`./blocks/fancy-card` and `../shared-ui` name `fancy-card` and
    /// `shared-ui`). The derived context is always local: the parent's
    /// staging slot already contains the files, so no clone or fetch is
    /// ever issued for a sub-block.
    #[must_use]
    pub fn derive_sub_block(&self, relative_locator: &str) -> BlockContext {
        let rel = relative_locator.trim_start_matches("./");
        let source_path = self.source_path.join(rel);
        let name = relative_locator
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(relative_locator)
            .to_string();

        BlockContext {
            locator: relative_locator.to_string(),
            url: relative_locator.to_string(),
            route_path: normalize_route_path(&name),
            name,
            is_local: true,
            source_id: None,
            branch: None,
            staging_dir: None,
            parent_dir: Some(self.source_path.clone()),
            repo_exists: source_path.exists(),
            source_path,
            route_origin: RouteOrigin::Derived,
        }
    }
}
