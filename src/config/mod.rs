//! Global configuration management for blockpm.
//!
//! Handles the user-wide configuration file (`~/.blockpm/config.toml`) which
//! stores defaults the `add` command falls back to when the corresponding
//! flag is not given: the npm registry, the package-manager client, the block
//! sub-path inside source repositories, and the dev-server port used for the
//! advisory view URL.
//!
//! # Configuration File Location
//!
//! - **Unix/macOS**: `~/.blockpm/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\blockpm\config.toml`
//!
//! The location can be overridden with the `BLOCKPM_CONFIG` environment
//! variable (the `--config` flag sets it); the cache directory with
//! `BLOCKPM_CACHE_DIR`.
//!
//! # File Format
//!
//! ```toml
//! registry = "https://registry.npmjs.org"
//! client = "npm"
//! # Where block files live inside a source repository (default: repo root)
//! source_dir = "src"
//! dev_port = 3333
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::DEFAULT_DEV_PORT;

/// User-wide defaults loaded from `~/.blockpm/config.toml`.
///
/// Every field is optional in the file; [`GlobalConfig::default`] is a valid
/// configuration and is what first-run users get.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// npm registry URL passed to the package-manager client.
    pub registry: Option<String>,

    /// Preferred package-manager client ("npm", "pnpm", "yarn").
    /// Auto-detected from the host project when unset.
    pub client: Option<String>,

    /// Sub-path inside a block source repository where the block files live.
    /// `None` means the repository root.
    pub source_dir: Option<String>,

    /// Dev-server port used to build the advisory view URL.
    pub dev_port: u16,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            registry: None,
            client: None,
            source_dir: None,
            dev_port: DEFAULT_DEV_PORT,
        }
    }
}

impl GlobalConfig {
    /// Load the global configuration from the default location, or from the
    /// `BLOCKPM_CONFIG` override. A missing file yields the defaults.
    pub async fn load() -> Result<Self> {
        let path = match std::env::var("BLOCKPM_CONFIG") {
            Ok(custom) => PathBuf::from(shellexpand::tilde(&custom).into_owned()),
            Err(_) => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load the configuration from a specific file path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))
    }

    /// Save the configuration to a specific path, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write global config to {}", path.display()))?;
        Ok(())
    }

    /// Platform-specific default path of the configuration file.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("blockpm")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".blockpm")
        };

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_from_missing_file_errors() {
        let config = GlobalConfig::load_from(Path::new("/nonexistent/config.toml")).await;
        assert!(config.is_err());
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults_when_file_absent() {
        unsafe { std::env::set_var("BLOCKPM_CONFIG", "/nonexistent/blockpm/config.toml") };
        let config = GlobalConfig::load().await.unwrap();
        unsafe { std::env::remove_var("BLOCKPM_CONFIG") };

        assert_eq!(config.dev_port, DEFAULT_DEV_PORT);
        assert!(config.registry.is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = GlobalConfig {
            registry: Some("https://registry.npmmirror.com".to_string()),
            client: Some("pnpm".to_string()),
            source_dir: Some("src".to_string()),
            dev_port: 4000,
        };
        config.save_to(&path).await.unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.registry.as_deref(), Some("https://registry.npmmirror.com"));
        assert_eq!(loaded.client.as_deref(), Some("pnpm"));
        assert_eq!(loaded.dev_port, 4000);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "client = \"yarn\"\n").unwrap();

        let loaded = GlobalConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.client.as_deref(), Some("yarn"));
        assert_eq!(loaded.dev_port, DEFAULT_DEV_PORT);
    }
}
