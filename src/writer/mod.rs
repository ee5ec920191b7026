//! Host-project mutation: route entries and container imports.
//!
//! Both operations are idempotent; the orchestrator calls them without
//! pre-checking. `write_route` inserts a route entry into the host's
//! `config/routes.json`, rejecting a conflicting entry for the same path.
//! `append_import` ensures the container index exports the block exactly
//! once. Writes go through the atomic-rename helper so a crash never leaves
//! a half-written host file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::core::BlockpmError;
use crate::utils::fs::{atomic_write, read_json_file, write_json_file};

/// One entry in the host's configuration-style routes file.
///
/// Unknown fields written by the host framework are preserved through
/// `extra`, so blockpm round-trips routes it did not create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteEntry {
    /// Route path, `/`-prefixed.
    pub path: String,
    /// Component (page folder) name the route renders.
    pub component: String,
    /// Nested routes. Layout blocks carry an empty placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl RouteEntry {
    /// A plain page route.
    #[must_use]
    pub fn page(path: &str, component: &str) -> Self {
        Self {
            path: path.to_string(),
            component: component.to_string(),
            routes: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A layout route, carrying the empty nested-routes placeholder.
    #[must_use]
    pub fn layout(path: &str, component: &str) -> Self {
        Self {
            routes: Some(Vec::new()),
            ..Self::page(path, component)
        }
    }
}

/// What `write_route` / `append_import` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The entry was inserted or appended.
    Written,
    /// An equivalent entry was already present; nothing changed.
    AlreadyPresent,
}

/// Whether the host project uses configuration-style routes.
///
/// Absence downgrades route injection to a logged skip; blockpm does not
/// create a routes file in a project that never had one.
#[must_use]
pub fn supports_config_routes(routes_file: &Path) -> bool {
    routes_file.exists()
}

/// Inserts `entry` into the routes file, idempotently.
///
/// An existing entry with the same path and component is left alone. An
/// existing entry with the same path but a different component is a
/// conflict and fails with [`BlockpmError::RouteWriteFailed`]; blockpm
/// never silently reroutes an existing page.
pub fn write_route(entry: &RouteEntry, routes_file: &Path) -> Result<WriteOutcome> {
    let fail = |reason: String| BlockpmError::RouteWriteFailed {
        route: entry.path.clone(),
        file: routes_file.display().to_string(),
        reason,
    };

    let mut routes: Vec<RouteEntry> =
        read_json_file(routes_file).map_err(|e| fail(e.to_string()))?;

    if let Some(existing) = routes.iter().find(|r| r.path == entry.path) {
        if existing.component == entry.component {
            return Ok(WriteOutcome::AlreadyPresent);
        }
        return Err(fail(format!(
            "route already mapped to component '{}'",
            existing.component
        ))
        .into());
    }

    routes.push(entry.clone());
    write_json_file(routes_file, &routes).map_err(|e| fail(e.to_string()))?;
    Ok(WriteOutcome::Written)
}

/// Ensures the container index exports `block_folder` exactly once.
///
/// The container file is created when absent. The export line follows the
/// host convention `export { default as Name } from './Name';`.
pub fn append_import(container_file: &Path, block_folder: &str) -> Result<WriteOutcome> {
    let fail = |reason: String| BlockpmError::ContainerWriteFailed {
        block: block_folder.to_string(),
        file: container_file.display().to_string(),
        reason,
    };

    let existing = if container_file.exists() {
        std::fs::read_to_string(container_file).map_err(|e| fail(e.to_string()))?
    } else {
        String::new()
    };

    let import_line = format!("export {{ default as {block_folder} }} from './{block_folder}';");
    if existing.lines().any(|line| line.trim() == import_line) {
        return Ok(WriteOutcome::AlreadyPresent);
    }

    if let Some(parent) = container_file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(&import_line);
    content.push('\n');

    atomic_write(container_file, content.as_bytes()).map_err(|e| fail(e.to_string()))?;
    Ok(WriteOutcome::Written)
}
