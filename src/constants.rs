//! Global constants used throughout the blockpm codebase.
//!
//! This module contains timeout durations, well-known file names, and other
//! constants that are used across multiple modules. Defining them centrally
//! improves maintainability and makes magic values more discoverable.

use std::time::Duration;

/// Name of the block manifest file expected at the root of a block source.
pub const MANIFEST_FILE: &str = "package.json";

/// Directory inside the host project holding routed pages.
pub const PAGES_DIR: &str = "src/pages";

/// Directory inside the host project holding shared components.
pub const COMPONENTS_DIR: &str = "src/components";

/// Barrel file receiving the import line for component-mode blocks.
pub const COMPONENTS_INDEX_FILE: &str = "src/components/index.js";

/// Configuration-style routes file of the host project.
///
/// Route injection is only supported when this file exists; hosts using
/// convention-based routing are skipped with a logged notice.
pub const ROUTES_FILE: &str = "config/routes.json";

/// Default dev-server port used to build the advisory view URL.
pub const DEFAULT_DEV_PORT: u16 = 3333;

/// Timeout for Git fetch operations (60 seconds).
///
/// This timeout prevents hung network connections from blocking
/// cache reconciliation indefinitely.
pub const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for Git clone operations (120 seconds).
///
/// Clone operations may take longer than fetch, especially
/// for large repositories.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for package-manager install subprocesses (5 minutes).
///
/// Dependency installation hits the network and can legitimately take a
/// while on cold registries; anything beyond this is treated as hung.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);
