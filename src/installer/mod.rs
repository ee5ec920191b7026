//! npm dependency installation boundary.
//!
//! A block declares runtime dependencies in its manifest; the host project
//! already has its own. The installer reconciles the two and installs only
//! what the host is missing, by shelling out to the host's package-manager
//! client (pnpm, yarn, or npm, detected from lockfiles). The orchestrator
//! talks to the [`DependencyInstaller`] trait so tests can substitute a
//! recording mock and verify dry-run never reaches a real install.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::constants::{INSTALL_TIMEOUT, MANIFEST_FILE};
use crate::core::BlockpmError;

/// The dependency sections of the host project's `package.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl HostManifest {
    /// Loads the host manifest; a missing file yields an empty manifest so
    /// reconciliation treats every requirement as missing.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        crate::utils::fs::read_json_file(&path)
    }

    /// Whether the host already declares `name` anywhere.
    #[must_use]
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

/// Installation knobs, resolved from flags and global config.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Explicit client ("npm"/"pnpm"/"yarn"); auto-detected when unset.
    pub client: Option<String>,
    /// Registry URL forwarded to the client.
    pub registry: Option<String>,
    /// Compute everything, run nothing.
    pub dry_run: bool,
    /// Skip installation entirely (`--no-deps`).
    pub skip: bool,
}

/// What an install call did (or would have done).
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Package specs (`name@range`) that were installed, or would be in
    /// dry-run mode.
    pub installed: Vec<String>,
    /// Packages the host already had, left untouched.
    pub already_present: Vec<String>,
    /// The client that was (or would have been) used.
    pub client: Option<String>,
    /// True when installation was skipped via options.
    pub skipped: bool,
}

/// Merges requirement maps from the block and its sub-blocks.
///
/// The same package requested twice with the same range collapses into one
/// requirement; two different ranges for one package is a
/// [`BlockpmError::DependencyConflict`] because blockpm has no resolver to
/// arbitrate between them.
pub fn merge_requirements(
    sets: &[&BTreeMap<String, String>],
) -> Result<BTreeMap<String, String>> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for set in sets {
        for (name, range) in *set {
            match merged.get(name) {
                None => {
                    merged.insert(name.clone(), range.clone());
                }
                Some(existing) if existing == range => {}
                Some(existing) => {
                    return Err(BlockpmError::DependencyConflict {
                        name: name.clone(),
                        wanted: range.clone(),
                        existing: existing.clone(),
                    }
                    .into());
                }
            }
        }
    }
    Ok(merged)
}

/// Splits merged requirements into missing and already-present sets.
#[must_use]
pub fn partition_missing(
    requirements: &BTreeMap<String, String>,
    host: &HostManifest,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut missing = BTreeMap::new();
    let mut present = Vec::new();
    for (name, range) in requirements {
        if host.has_dependency(name) {
            present.push(name.clone());
        } else {
            missing.insert(name.clone(), range.clone());
        }
    }
    (missing, present)
}

/// Picks the package-manager client for a project.
///
/// Explicit override wins; otherwise the lockfile decides; otherwise the
/// first client found on PATH, defaulting to npm.
#[must_use]
pub fn detect_client(project_dir: &Path, explicit: Option<&str>) -> String {
    if let Some(client) = explicit {
        return client.to_string();
    }
    if project_dir.join("pnpm-lock.yaml").exists() {
        return "pnpm".to_string();
    }
    if project_dir.join("yarn.lock").exists() {
        return "yarn".to_string();
    }
    if project_dir.join("package-lock.json").exists() {
        return "npm".to_string();
    }
    for candidate in ["pnpm", "yarn", "npm"] {
        if which::which(candidate).is_ok() {
            return candidate.to_string();
        }
    }
    "npm".to_string()
}

/// Boundary trait for dependency installation.
pub trait DependencyInstaller: Send + Sync {
    /// Installs the missing subset of `requirements` into `project_dir`.
    fn install(
        &self,
        project_dir: &Path,
        requirements: &BTreeMap<String, String>,
        options: &InstallOptions,
    ) -> impl std::future::Future<Output = Result<InstallReport>> + Send;
}

/// The real installer: shells out to the detected client.
#[derive(Debug, Clone, Default)]
pub struct PackageInstaller;

impl PackageInstaller {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn install_args(client: &str, specs: &[String], registry: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = match client {
        "yarn" | "pnpm" => vec!["add".to_string()],
        _ => vec!["install".to_string(), "--save".to_string()],
    };
    args.extend(specs.iter().cloned());
    if let Some(registry) = registry {
        args.push("--registry".to_string());
        args.push(registry.to_string());
    }
    args
}

impl DependencyInstaller for PackageInstaller {
    async fn install(
        &self,
        project_dir: &Path,
        requirements: &BTreeMap<String, String>,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        if options.skip {
            debug!("Dependency installation skipped by request");
            return Ok(InstallReport {
                skipped: true,
                ..Default::default()
            });
        }

        let host = HostManifest::load(project_dir)?;
        let (missing, already_present) = partition_missing(requirements, &host);

        let client = detect_client(project_dir, options.client.as_deref());
        let specs: Vec<String> = missing
            .iter()
            .map(|(name, range)| format!("{name}@{range}"))
            .collect();

        if specs.is_empty() {
            debug!("All block dependencies already present in the host project");
            return Ok(InstallReport {
                already_present,
                client: Some(client),
                ..Default::default()
            });
        }

        if options.dry_run {
            info!("[dry-run] would run {client} to install: {}", specs.join(", "));
            return Ok(InstallReport {
                installed: specs,
                already_present,
                client: Some(client),
                skipped: false,
            });
        }

        let args = install_args(&client, &specs, options.registry.as_deref());
        debug!("Running {client} {}", args.join(" "));

        let child = Command::new(&client)
            .args(&args)
            .current_dir(project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BlockpmError::InstallFailed {
                reason: format!("failed to spawn {client}: {e}"),
            })?;

        let output = tokio::time::timeout(INSTALL_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| BlockpmError::InstallFailed {
                reason: format!(
                    "{client} timed out after {} seconds",
                    INSTALL_TIMEOUT.as_secs()
                ),
            })?
            .map_err(|e| BlockpmError::InstallFailed {
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(BlockpmError::InstallFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(InstallReport {
            installed: specs,
            already_present,
            client: Some(client),
            skipped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn deps(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_merge_deduplicates_equal_ranges() {
        let a = deps(&[("react", "^18.0.0"), ("classnames", "^2.0.0")]);
        let b = deps(&[("react", "^18.0.0")]);
        let merged = merge_requirements(&[&a, &b]).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_conflict() {
        let a = deps(&[("react", "^18.0.0")]);
        let b = deps(&[("react", "^17.0.0")]);
        let err = merge_requirements(&[&a, &b]).unwrap_err();
        let err = err.downcast::<BlockpmError>().unwrap();
        assert!(matches!(
            err,
            BlockpmError::DependencyConflict { ref name, .. } if name == "react"
        ));
    }

    #[test]
    fn test_partition_against_host() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"dependencies": {"react": "^18.2.0"}, "devDependencies": {"vite": "^5.0.0"}}"#,
        )
        .unwrap();
        let host = HostManifest::load(temp.path()).unwrap();

        let wanted = deps(&[("react", "^18.0.0"), ("vite", "^5.0.0"), ("classnames", "^2.0.0")]);
        let (missing, present) = partition_missing(&wanted, &host);

        assert_eq!(missing.len(), 1);
        assert!(missing.contains_key("classnames"));
        assert_eq!(present, vec!["react", "vite"]);
    }

    #[test]
    fn test_client_detection_by_lockfile() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("yarn.lock"), "").unwrap();
        assert_eq!(detect_client(temp.path(), None), "yarn");
        assert_eq!(detect_client(temp.path(), Some("pnpm")), "pnpm");

        std::fs::write(temp.path().join("pnpm-lock.yaml"), "").unwrap();
        // pnpm lockfile takes precedence.
        assert_eq!(detect_client(temp.path(), None), "pnpm");
    }

    #[test]
    fn test_install_args_per_client() {
        let specs = vec!["classnames@^2.0.0".to_string()];
        assert_eq!(
            install_args("npm", &specs, None),
            vec!["install", "--save", "classnames@^2.0.0"]
        );
        assert_eq!(
            install_args("pnpm", &specs, Some("https://registry.npmmirror.com")),
            vec![
                "add",
                "classnames@^2.0.0",
                "--registry",
                "https://registry.npmmirror.com"
            ]
        );
    }

    #[tokio::test]
    async fn test_skip_and_dry_run_spawn_nothing() {
        let temp = TempDir::new().unwrap();
        let wanted = deps(&[("left-pad", "^1.0.0")]);

        let report = PackageInstaller::new()
            .install(
                temp.path(),
                &wanted,
                &InstallOptions {
                    skip: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(report.skipped);
        assert!(report.installed.is_empty());

        let report = PackageInstaller::new()
            .install(
                temp.path(),
                &wanted,
                &InstallOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!report.skipped);
        assert_eq!(report.installed, vec!["left-pad@^1.0.0"]);
        // No lockfile or node_modules appeared.
        assert!(!temp.path().join("node_modules").exists());
    }
}
