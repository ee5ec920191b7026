//! Shared fixtures and mocks for unit and integration tests.
//!
//! Only compiled for tests or with the `test-utils` feature, so nothing
//! here ships in release builds.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tempfile::TempDir;

use crate::constants::{COMPONENTS_INDEX_FILE, MANIFEST_FILE, ROUTES_FILE};
use crate::installer::{DependencyInstaller, InstallOptions, InstallReport};

static INIT_LOGGING: Once = Once::new();

/// Initializes tracing for tests, once per process.
///
/// Honors `RUST_LOG`, defaulting to `debug` output routed through the test
/// writer so it only shows for failing tests.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Builds a block source directory on disk.
///
/// The fixture owns its temp directory; dropping it removes the files.
pub struct BlockSourceFixture {
    dir: TempDir,
}

impl BlockSourceFixture {
    /// A component block: manifest plus an entry file and a stylesheet.
    pub fn component(name: &str) -> Result<Self> {
        Self::with_manifest(&serde_json::json!({
            "name": name,
            "version": "1.0.0",
            "dependencies": { "classnames": "^2.3.0" }
        }))
    }

    /// A page block declaring `specVersion` and the given sub-blocks.
    ///
    /// Each sub-block is seeded under `blocks/<name>` with its own manifest.
    pub fn page(name: &str, sub_blocks: &[&str]) -> Result<Self> {
        let deps: Vec<String> =
            sub_blocks.iter().map(|sub| format!("./blocks/{sub}")).collect();

        let fixture = Self::with_manifest(&serde_json::json!({
            "name": name,
            "version": "1.0.0",
            "dependencies": { "react": "^18.0.0" },
            "blockConfig": {
                "specVersion": "0.1",
                "dependencies": deps
            }
        }))?;

        for sub in sub_blocks {
            let sub_dir = fixture.path().join("blocks").join(sub);
            std::fs::create_dir_all(&sub_dir)?;
            std::fs::write(
                sub_dir.join(MANIFEST_FILE),
                serde_json::to_string_pretty(&serde_json::json!({
                    "name": sub,
                    "dependencies": { "classnames": "^2.3.0" }
                }))?,
            )?;
            std::fs::write(sub_dir.join("index.jsx"), "export default () => null;\n")?;
        }

        Ok(fixture)
    }

    /// A block with an arbitrary manifest value.
    pub fn with_manifest(manifest: &serde_json::Value) -> Result<Self> {
        let dir = TempDir::new()?;
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_string_pretty(manifest)?,
        )?;
        std::fs::write(dir.path().join("index.jsx"), "export default () => null;\n")?;
        std::fs::write(dir.path().join("style.css"), ".block {}\n")?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The path as a locator string.
    #[must_use]
    pub fn locator(&self) -> String {
        self.dir.path().display().to_string()
    }
}

/// Builds a host front-end project with the standard layout.
pub struct HostProjectFixture {
    dir: TempDir,
}

impl HostProjectFixture {
    /// A project with `package.json`, `config/routes.json`, and the
    /// pages/components directories.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_string_pretty(&serde_json::json!({
                "name": "host-app",
                "dependencies": { "react": "^18.2.0" }
            }))?,
        )?;

        let routes = dir.path().join(ROUTES_FILE);
        std::fs::create_dir_all(routes.parent().unwrap())?;
        std::fs::write(&routes, "[]")?;

        std::fs::create_dir_all(dir.path().join("src/pages"))?;
        let index = dir.path().join(COMPONENTS_INDEX_FILE);
        std::fs::create_dir_all(index.parent().unwrap())?;
        std::fs::write(&index, "")?;

        Ok(Self { dir })
    }

    /// A project without a routes file (no configuration-routes support).
    pub fn without_routes() -> Result<Self> {
        let fixture = Self::new()?;
        std::fs::remove_file(fixture.path().join(ROUTES_FILE))?;
        Ok(fixture)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn routes_file(&self) -> PathBuf {
        self.dir.path().join(ROUTES_FILE)
    }

    #[must_use]
    pub fn components_index(&self) -> PathBuf {
        self.dir.path().join(COMPONENTS_INDEX_FILE)
    }
}

/// One recorded call to [`RecordingInstaller::install`].
#[derive(Debug, Clone)]
pub struct RecordedInstall {
    pub requirements: BTreeMap<String, String>,
    pub dry_run: bool,
    pub skip: bool,
}

/// Installer mock that records calls and never spawns a process.
#[derive(Debug, Default)]
pub struct RecordingInstaller {
    calls: Mutex<Vec<RecordedInstall>>,
}

impl RecordingInstaller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RecordedInstall> {
        self.calls.lock().unwrap().clone()
    }
}

impl DependencyInstaller for RecordingInstaller {
    async fn install(
        &self,
        _project_dir: &Path,
        requirements: &BTreeMap<String, String>,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        self.calls.lock().unwrap().push(RecordedInstall {
            requirements: requirements.clone(),
            dry_run: options.dry_run,
            skip: options.skip,
        });
        Ok(InstallReport {
            installed: requirements
                .iter()
                .map(|(name, range)| format!("{name}@{range}"))
                .collect(),
            already_present: Vec::new(),
            client: Some("npm".to_string()),
            skipped: options.skip,
        })
    }
}
