//! blockpm integrates reusable front-end code blocks into a host project.
//!
//! A *block* is a self-contained fragment of UI code (a page or a
//! component) living in a git repository or a local directory, described by
//! a `package.json` manifest. `blockpm add <locator>` acquires the block,
//! stages remote sources in a per-user cache, installs the npm dependencies
//! the host is missing, copies the block's files into `src/pages/` or
//! `src/components/`, materializes its declared sub-blocks, and wires it
//! into the host via a route entry and a container import.
//!
//! # Architecture
//!
//! - [`source`] - locator parsing into an acquisition context
//! - [`cache`] - staging cache and the clone/update reconcile machine
//! - [`git`] - system-git plumbing with timeouts
//! - [`manifest`] - block `package.json` parsing
//! - [`installer`] - npm dependency reconciliation and install
//! - [`generator`] - file materialization into the host project
//! - [`writer`] - idempotent route and container-import injection
//! - [`integrator`] - the ordered pipeline tying it all together
//! - [`cli`] - the clap-based command surface
//!
//! The pipeline is fail-fast with no rollback: a fatal stage aborts the
//! run, leaving earlier stages' output in place. The one deliberate
//! exception is a failed update of an already-cached repository, which
//! degrades to reusing the stale copy with a warning.

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod generator;
pub mod git;
pub mod installer;
pub mod integrator;
pub mod manifest;
pub mod source;
pub mod utils;
pub mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::{BlockpmError, ErrorContext, user_friendly_error};
pub use integrator::{IntegrateOptions, IntegrationResult, Integrator};
