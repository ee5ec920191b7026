//! Block file materialization into the host project.
//!
//! The generator is a boundary the orchestrator depends on through the
//! [`CodeGenerator`] trait, so it can be mocked in tests. The shipped
//! implementation, [`ScaffoldGenerator`], copies the block's source tree
//! into a PascalCase folder under the computed target directory. It never
//! transforms code; dialect conversion is delegated to external tooling and
//! only recorded in the log.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::MANIFEST_FILE;
use crate::core::BlockpmError;
use crate::utils::fs::copy_dir_filtered;
use crate::utils::to_pascal_case;

/// Everything the generator needs for one block.
#[derive(Debug, Clone)]
pub struct GenerationSpec {
    /// Root of the block's source files (already on disk).
    pub source_path: PathBuf,
    /// Directory the block folder is created under.
    pub target_path: PathBuf,
    /// Block name. The output folder is its PascalCase form.
    pub block_name: String,
    /// Page blocks may create a new route; component blocks never do.
    pub is_page_block: bool,
    /// When set, compute all outputs but write nothing.
    pub dry_run: bool,
    /// Skip `locale`/`locales` directories in the source tree.
    pub strip_locale: bool,
    /// Requested target dialect ("js"/"ts"). Conversion is external; the
    /// value is logged so the user knows it was not applied here.
    pub dialect: Option<String>,
    /// Source-relative directories to leave out of the copy. The
    /// orchestrator lists sub-block source directories here so they are
    /// materialized once, through their own generation pass.
    pub skip_dirs: Vec<PathBuf>,
}

/// What generation produced (or, in dry-run, would produce).
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// The directory the block folder was created under.
    pub path: PathBuf,
    /// PascalCase folder name, e.g. `FancyCard`.
    pub block_folder_name: String,
    /// Absolute path of the block folder.
    pub block_folder_path: PathBuf,
    /// The block's entry file inside the folder.
    pub entry_path: PathBuf,
    /// True only when a page block's folder was newly created.
    pub need_create_new_route: bool,
    /// Every file written (or projected, in dry-run), absolute paths.
    pub generated_paths: Vec<PathBuf>,
}

/// Boundary trait for block materialization.
pub trait CodeGenerator: Send + Sync {
    /// Materializes one block as described by `spec`.
    fn generate(
        &self,
        spec: &GenerationSpec,
    ) -> impl std::future::Future<Output = Result<GenerationResult>> + Send;
}

/// Copy-based generator. No templating, no code transformation.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldGenerator;

impl ScaffoldGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Files never copied into the host project.
const EXCLUDED_NAMES: &[&str] = &[
    ".git",
    "node_modules",
    MANIFEST_FILE,
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

fn build_skip<'a>(spec: &'a GenerationSpec) -> impl Fn(&Path) -> bool + 'a {
    move |candidate: &Path| {
        let Some(name) = candidate.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if EXCLUDED_NAMES.contains(&name.as_ref()) {
            return true;
        }
        if spec.strip_locale && (name == "locale" || name == "locales") {
            return true;
        }
        spec.skip_dirs
            .iter()
            .any(|dir| candidate == spec.source_path.join(dir))
    }
}

/// Picks the block's entry file from the generated set.
///
/// Prefers an `index.*` file at the folder root, matching the dialect's
/// extension when one is requested; falls back to `index.js`.
fn find_entry(folder: &Path, generated: &[PathBuf], dialect: Option<&str>) -> PathBuf {
    let preferred: &[&str] = match dialect {
        Some("ts") => &["index.tsx", "index.ts", "index.jsx", "index.js"],
        _ => &["index.jsx", "index.js", "index.tsx", "index.ts"],
    };
    for name in preferred {
        let candidate = folder.join(name);
        if generated.contains(&candidate) {
            return candidate;
        }
    }
    folder.join("index.js")
}

/// Projects the post-copy paths without writing, for dry-run.
fn project_paths(
    spec: &GenerationSpec,
    folder: &Path,
    skip: &dyn Fn(&Path) -> bool,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let walker = walkdir::WalkDir::new(&spec.source_path)
        .into_iter()
        .filter_entry(|e| !skip(e.path()));
    for entry in walker.filter_map(std::result::Result::ok) {
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(&spec.source_path) {
                paths.push(folder.join(rel));
            }
        }
    }
    paths.sort();
    paths
}

impl CodeGenerator for ScaffoldGenerator {
    async fn generate(&self, spec: &GenerationSpec) -> Result<GenerationResult> {
        if !spec.source_path.exists() {
            return Err(BlockpmError::GenerationFailed {
                block: spec.block_name.clone(),
                reason: format!("source files missing at {}", spec.source_path.display()),
            }
            .into());
        }

        if let Some(dialect) = &spec.dialect {
            debug!(
                "Target dialect '{dialect}' requested; conversion is delegated to external tooling"
            );
        }

        let block_folder_name = to_pascal_case(&spec.block_name);
        let block_folder_path = spec.target_path.join(&block_folder_name);
        let folder_preexisted = block_folder_path.exists();
        let need_create_new_route = spec.is_page_block && !folder_preexisted;

        let skip = build_skip(spec);
        let generated_paths = if spec.dry_run {
            project_paths(spec, &block_folder_path, &skip)
        } else {
            let mut copied =
                copy_dir_filtered(&spec.source_path, &block_folder_path, &skip).map_err(|e| {
                    BlockpmError::GenerationFailed {
                        block: spec.block_name.clone(),
                        reason: e.to_string(),
                    }
                })?;
            copied.sort();
            copied
        };

        let entry_path = find_entry(&block_folder_path, &generated_paths, spec.dialect.as_deref());

        Ok(GenerationResult {
            path: spec.target_path.clone(),
            block_folder_name,
            block_folder_path,
            entry_path,
            need_create_new_route,
            generated_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec(source: &Path, target: &Path) -> GenerationSpec {
        GenerationSpec {
            source_path: source.to_path_buf(),
            target_path: target.to_path_buf(),
            block_name: "fancy-card".to_string(),
            is_page_block: false,
            dry_run: false,
            strip_locale: false,
            dialect: None,
            skip_dirs: Vec::new(),
        }
    }

    fn seed_block(dir: &Path) {
        std::fs::write(dir.join("index.jsx"), "export default () => null;\n").unwrap();
        std::fs::write(dir.join("style.css"), ".card {}\n").unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), "{\"name\":\"fancy-card\"}").unwrap();
        std::fs::create_dir_all(dir.join("locales")).unwrap();
        std::fs::write(dir.join("locales/en.json"), "{}").unwrap();
    }

    #[tokio::test]
    async fn test_copy_generation() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_block(source.path());

        let result = ScaffoldGenerator::new()
            .generate(&spec(source.path(), target.path()))
            .await
            .unwrap();

        assert_eq!(result.block_folder_name, "FancyCard");
        assert_eq!(result.block_folder_path, target.path().join("FancyCard"));
        assert!(result.block_folder_path.join("index.jsx").exists());
        assert!(result.block_folder_path.join("locales/en.json").exists());
        // The manifest stays behind.
        assert!(!result.block_folder_path.join(MANIFEST_FILE).exists());
        assert_eq!(result.entry_path, result.block_folder_path.join("index.jsx"));
        // Component blocks never request a route.
        assert!(!result.need_create_new_route);
    }

    #[tokio::test]
    async fn test_locale_stripping() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_block(source.path());

        let mut s = spec(source.path(), target.path());
        s.strip_locale = true;
        let result = ScaffoldGenerator::new().generate(&s).await.unwrap();

        assert!(!result.block_folder_path.join("locales").exists());
        assert!(result.block_folder_path.join("style.css").exists());
    }

    #[tokio::test]
    async fn test_new_page_block_requests_route() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_block(source.path());

        let mut s = spec(source.path(), target.path());
        s.is_page_block = true;
        let result = ScaffoldGenerator::new().generate(&s).await.unwrap();
        assert!(result.need_create_new_route);

        // Second run into the same folder: the page already exists.
        let result = ScaffoldGenerator::new().generate(&s).await.unwrap();
        assert!(!result.need_create_new_route);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing_but_projects_paths() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_block(source.path());

        let mut s = spec(source.path(), target.path());
        s.dry_run = true;
        s.is_page_block = true;
        let result = ScaffoldGenerator::new().generate(&s).await.unwrap();

        assert!(!result.block_folder_path.exists());
        assert!(result.need_create_new_route);
        assert!(
            result
                .generated_paths
                .contains(&result.block_folder_path.join("index.jsx"))
        );
        assert!(
            !result
                .generated_paths
                .iter()
                .any(|p| p.ends_with(MANIFEST_FILE))
        );
    }

    #[tokio::test]
    async fn test_skip_dirs_excludes_sub_block_sources() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        seed_block(source.path());
        std::fs::create_dir_all(source.path().join("blocks/inner")).unwrap();
        std::fs::write(source.path().join("blocks/inner/index.jsx"), "x").unwrap();

        let mut s = spec(source.path(), target.path());
        s.skip_dirs = vec![PathBuf::from("blocks/inner")];
        let result = ScaffoldGenerator::new().generate(&s).await.unwrap();

        assert!(!result.block_folder_path.join("blocks/inner").exists());
        assert!(result.block_folder_path.join("index.jsx").exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let target = TempDir::new().unwrap();
        let err = ScaffoldGenerator::new()
            .generate(&spec(Path::new("/nonexistent/source"), target.path()))
            .await
            .unwrap_err();
        let err = err.downcast::<BlockpmError>().unwrap();
        assert!(matches!(err, BlockpmError::GenerationFailed { .. }));
    }
}
