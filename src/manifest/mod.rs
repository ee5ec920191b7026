//! Block manifest parsing.
//!
//! Every block source carries a `package.json` at its root describing the
//! block: its name, its npm dependencies, and an optional `blockConfig`
//! section listing sub-blocks and the materialization spec version. The
//! manifest is the single source of truth for how a block is integrated;
//! a source directory without one is not a block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::MANIFEST_FILE;
use crate::core::BlockpmError;

/// The `blockConfig` section of a block manifest.
///
/// Presence of `spec_version` marks the block as a page-level block; its
/// absence marks a component-level block. Sub-blocks are always treated as
/// components regardless of their own config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockConfig {
    /// Materialization spec version. Page blocks declare one (e.g. "0.1").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,

    /// Sub-block source locators, paths relative to the parent source
    /// (e.g. `./blocks/fancy-card`, `../shared-ui`). Each sub-block's name
    /// is the locator's final path segment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// A parsed block manifest (`package.json` at the source root).
///
/// Unknown fields are preserved nowhere; the manifest is read-only input.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockManifest {
    /// Block package name, possibly scoped (e.g. `@ali/fancy-card`).
    #[serde(default)]
    pub name: String,

    /// Package version, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// npm runtime dependencies required by the block, name to semver range.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// Block-specific configuration. Absent for plain component blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_config: Option<BlockConfig>,
}

impl BlockManifest {
    /// Load and parse the manifest from a block source directory.
    ///
    /// Returns [`BlockpmError::ManifestMissing`] when the source has no
    /// `package.json` and [`BlockpmError::ManifestParseError`] when the file
    /// exists but is not valid JSON for this shape.
    pub fn load(source_path: &Path) -> Result<Self, BlockpmError> {
        let manifest_path = source_path.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(BlockpmError::ManifestMissing {
                path: source_path.display().to_string(),
            });
        }

        let content =
            std::fs::read_to_string(&manifest_path).map_err(|e| BlockpmError::ManifestParseError {
                file: manifest_path.display().to_string(),
                reason: e.to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| BlockpmError::ManifestParseError {
            file: manifest_path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether this manifest marks a page-level block.
    ///
    /// A block is page-level exactly when its `blockConfig` declares a
    /// `specVersion`.
    pub fn is_page_block(&self) -> bool {
        self.block_config
            .as_ref()
            .is_some_and(|c| c.spec_version.is_some())
    }

    /// Sub-block locators declared in `blockConfig`, empty when none.
    pub fn sub_blocks(&self) -> &[String] {
        self.block_config
            .as_ref()
            .map_or(&[], |config| config.dependencies.as_slice())
    }
}
