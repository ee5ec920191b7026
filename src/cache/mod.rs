//! Staging cache for remote block sources.
//!
//! Remote blocks are cloned once into a per-user staging directory
//! (`~/.blockpm/cache`, overridable with `BLOCKPM_CACHE_DIR`) and reused
//! across invocations. Each source gets a slot named by its deterministic
//! `source_id`, so the same locator always lands in the same place.
//!
//! The cache is single-writer by assumption; no cross-process locking is
//! performed. A populated slot implies a prior successful clone, but never
//! freshness, so cached slots are fetched before use. When that fetch fails
//! (offline, deleted branch) the stale copy is reused with a warning rather
//! than failing the whole integration; only the initial clone is fatal.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::BlockpmError;
use crate::git::{GitRepo, ensure_git_available, strip_auth_from_url};
use crate::source::BlockContext;
use crate::utils::fs::{dir_size, ensure_dir};

/// A resolved cache slot: whether it is populated and where it lives.
#[derive(Debug, Clone)]
pub struct CacheSlot {
    /// Whether the slot directory already exists on disk.
    pub exists: bool,
    /// Absolute path of the slot directory.
    pub path: PathBuf,
}

/// Storage abstraction over the staging directory.
///
/// The orchestrator only ever talks to this trait, so tests substitute a
/// temp-scoped store instead of touching the user's real cache.
pub trait CacheStore {
    /// The staging root remote sources are slotted under. The source
    /// resolver needs it to compute slot paths before any slot exists.
    fn staging_root(&self) -> PathBuf;

    /// Looks up the slot for a source without creating anything.
    fn resolve(&self, source_id: &str) -> CacheSlot;

    /// Prepares an empty slot path for a fresh clone, removing any partial
    /// leftovers from an earlier failed clone.
    fn reserve(&self, source_id: &str) -> Result<PathBuf>;
}

/// The on-disk staging cache.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Opens the user-wide cache, honoring the `BLOCKPM_CACHE_DIR` override.
    pub fn new() -> Result<Self> {
        let root = match std::env::var("BLOCKPM_CACHE_DIR") {
            Ok(custom) => PathBuf::from(shellexpand::tilde(&custom).into_owned()),
            Err(_) => dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".blockpm")
                .join("cache"),
        };
        Ok(Self { root })
    }

    /// Opens a cache rooted at an explicit directory. Used by tests.
    #[must_use]
    pub fn with_dir(root: PathBuf) -> Self {
        Self { root }
    }

    /// The staging root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all populated slots, sorted.
    pub fn list_slots(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut slots = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                slots.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        slots.sort();
        Ok(slots)
    }

    /// Total size of the cache in bytes.
    pub fn size(&self) -> Result<u64> {
        dir_size(&self.root)
    }

    /// Removes one slot, or the whole cache when `source_id` is `None`.
    ///
    /// Clearing a slot forces a clean clone on the next integration, which
    /// is the recovery path for corrupted or permanently stale slots.
    pub fn clean(&self, source_id: Option<&str>) -> Result<()> {
        let target = match source_id {
            Some(id) => self.root.join(id),
            None => self.root.clone(),
        };
        crate::utils::fs::remove_dir_all(&target)?;
        Ok(())
    }
}

impl CacheStore for Cache {
    fn staging_root(&self) -> PathBuf {
        self.root.clone()
    }

    fn resolve(&self, source_id: &str) -> CacheSlot {
        let path = self.root.join(source_id);
        CacheSlot {
            exists: path.exists(),
            path,
        }
    }

    fn reserve(&self, source_id: &str) -> Result<PathBuf> {
        ensure_dir(&self.root)?;
        let path = self.root.join(source_id);
        // A leftover directory here means an earlier clone died partway.
        crate::utils::fs::remove_dir_all(&path)?;
        Ok(path)
    }
}

/// How reconciliation obtained the block source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local source, nothing to synchronize.
    Local,
    /// Fresh clone into a previously empty slot.
    Cloned,
    /// Existing slot fetched and checked out successfully.
    Updated,
    /// Update failed; the stale cached copy is being reused.
    StaleReused {
        /// Why the update failed.
        reason: String,
    },
}

/// Brings the context's source files into existence on disk.
///
/// State machine: local sources are a no-op; an empty slot is cloned (clone
/// failure is fatal); a populated slot is fetched and checked out, degrading
/// to stale reuse on failure. The terminal postcondition in every arm is
/// that `ctx.source_path` exists, otherwise [`BlockpmError::MissingSourceFiles`]
/// fires before any host-project mutation can happen.
pub async fn reconcile(ctx: &BlockContext, store: &impl CacheStore) -> Result<SyncOutcome> {
    let outcome = if ctx.is_local {
        SyncOutcome::Local
    } else {
        sync_remote(ctx, store).await?
    };

    if !ctx.source_path.exists() {
        return Err(BlockpmError::MissingSourceFiles {
            path: ctx.source_path.display().to_string(),
        }
        .into());
    }

    Ok(outcome)
}

async fn sync_remote(ctx: &BlockContext, store: &impl CacheStore) -> Result<SyncOutcome> {
    ensure_git_available()?;

    let source_id = ctx
        .source_id
        .as_deref()
        .ok_or_else(|| BlockpmError::InvalidSource {
            locator: ctx.locator.clone(),
            reason: "remote context without a source id".to_string(),
        })?;

    let slot = store.resolve(source_id);
    let display_url = strip_auth_from_url(&ctx.url);

    if !slot.exists {
        let target = store.reserve(source_id)?;
        debug!("Cloning {display_url} into {}", target.display());
        let repo = GitRepo::clone(&ctx.url, &target).await?;
        if let Some(branch) = &ctx.branch {
            repo.checkout(branch).await?;
        }
        return Ok(SyncOutcome::Cloned);
    }

    debug!("Updating cached slot {}", slot.path.display());
    let repo = GitRepo::new(&slot.path);
    let update = async {
        repo.fetch().await?;
        // A bare fetch never moves the working tree; check out the fetched
        // tip of the requested (or current) branch.
        let branch = match &ctx.branch {
            Some(branch) => branch.clone(),
            None => repo.current_branch().await?,
        };
        repo.checkout(&branch).await?;
        Ok::<(), anyhow::Error>(())
    };

    match update.await {
        Ok(()) => Ok(SyncOutcome::Updated),
        Err(e) => {
            let recovered = BlockpmError::UpdateFailed {
                url: display_url.clone(),
                reason: e.to_string(),
            };
            warn!("{recovered}; reusing the cached copy");
            Ok(SyncOutcome::StaleReused {
                reason: e.to_string(),
            })
        }
    }
}
