//! Core types and functionality for blockpm
//!
//! This module forms the foundation of blockpm's type system. It hosts the
//! error taxonomy shared by the whole acquisition-and-integration pipeline
//! and the user-facing error presentation layer.
//!
//! # Error Management
//!
//! blockpm uses a two-layer error system designed for both developer
//! ergonomics and end-user experience:
//! - **Strongly-typed errors** ([`BlockpmError`]) for precise handling in code
//! - **User-friendly contexts** ([`ErrorContext`]) with actionable suggestions
//!   for CLI users
//! - **Automatic conversion** from common standard library errors
//!
//! Every operation that can fail returns a [`anyhow::Result`] whose root
//! cause downcasts to a [`BlockpmError`] variant wherever the failure mode is
//! one the pipeline distinguishes (clone vs update vs generation, and so on).

pub mod error;

pub use error::{BlockpmError, ErrorContext, user_friendly_error};
