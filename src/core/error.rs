//! Error handling for blockpm
//!
//! The error system is designed around two core principles:
//! 1. **Strongly-typed errors** for precise handling in the pipeline
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! It consists of two main types:
//! - [`BlockpmError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! # Error Categories
//!
//! - **Pre-flight**: [`BlockpmError::InvalidSource`], [`BlockpmError::GitNotFound`]
//! - **Acquisition**: [`BlockpmError::CloneFailed`], [`BlockpmError::UpdateFailed`],
//!   [`BlockpmError::MissingSourceFiles`]
//! - **Manifest**: [`BlockpmError::ManifestMissing`], [`BlockpmError::ManifestParseError`]
//! - **Integration**: [`BlockpmError::InstallFailed`], [`BlockpmError::GenerationFailed`],
//!   [`BlockpmError::SubBlockGenerationFailed`], [`BlockpmError::RouteWriteFailed`],
//!   [`BlockpmError::ContainerWriteFailed`]
//!
//! `UpdateFailed` is the one *recovered* condition: the pipeline logs it and
//! proceeds with the stale cache instead of aborting. Every other variant is
//! fatal and stops the remaining stages; completed stages are never rolled
//! back (re-running, or `blockpm cache clean`, is the recovery path).
//!
//! Common standard library errors are converted automatically:
//! - [`std::io::Error`] → [`BlockpmError::IoError`]
//! - [`serde_json::Error`] → [`BlockpmError::JsonError`]
//! - [`toml::de::Error`] → [`BlockpmError::TomlError`]
//!
//! Use [`user_friendly_error`] to convert any error into a user-friendly
//! format with contextual suggestions for CLI display.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for blockpm operations.
///
/// Each variant represents a specific failure mode in the acquisition and
/// integration pipeline, carrying enough context (stage, path, underlying
/// cause) to diagnose the failure without a debugger.
#[derive(Error, Debug)]
pub enum BlockpmError {
    /// The source locator could not be parsed into a usable block source.
    #[error("Invalid block source '{locator}': {reason}")]
    InvalidSource {
        /// The locator string as supplied by the user
        locator: String,
        /// Why it could not be parsed
        reason: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git subprocess returned a non-zero exit code.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "clone", "fetch", "checkout")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Initial clone of a block repository failed. Fatal: there is no
    /// fallback when nothing is cached yet.
    #[error("Failed to clone block repository: {url}")]
    CloneFailed {
        /// The repository URL that failed to clone
        url: String,
        /// The reason for the clone failure
        reason: String,
    },

    /// Refreshing an already-cached block repository failed.
    ///
    /// Recovered, never surfaced as a pipeline failure on its own: a
    /// stale-but-present block is preferable to aborting. Reported as a
    /// warning; `blockpm cache clean` forces a clean clone.
    #[error("Failed to update cached repository: {url}")]
    UpdateFailed {
        /// The repository URL that failed to update
        url: String,
        /// The reason for the update failure
        reason: String,
    },

    /// The block's source files are absent after cache reconciliation.
    ///
    /// This is the single hard gate protecting the host project: nothing is
    /// mutated before this check passes.
    #[error("Block source files not found at {path}")]
    MissingSourceFiles {
        /// Path that was expected to contain the block files
        path: String,
    },

    /// The block manifest (package.json) is absent from the source tree.
    #[error("Block manifest not found at {path}")]
    ManifestMissing {
        /// Path where the manifest was expected
        path: String,
    },

    /// The block manifest exists but could not be parsed.
    #[error("Invalid block manifest in {file}")]
    ManifestParseError {
        /// Path to the manifest file that failed to parse
        file: String,
        /// Specific reason for the parsing failure
        reason: String,
    },

    /// Two requirements ask for incompatible versions of the same package.
    #[error("Dependency conflict for package '{name}': block wants {wanted}, host has {existing}")]
    DependencyConflict {
        /// The conflicting package name
        name: String,
        /// Version requested by the block
        wanted: String,
        /// Version already present in the host project
        existing: String,
    },

    /// The package-manager subprocess failed to install dependencies.
    #[error("Dependency installation failed: {reason}")]
    InstallFailed {
        /// Installer output or failure description
        reason: String,
    },

    /// Code generation for the primary block failed.
    #[error("Block generation failed for '{block}': {reason}")]
    GenerationFailed {
        /// Name of the block being generated
        block: String,
        /// Why generation failed
        reason: String,
    },

    /// Code generation for a declared sub-block failed. Aborts the whole
    /// operation; partial sub-block trees are not cleaned up.
    #[error("Sub-block generation failed for '{block}': {reason}")]
    SubBlockGenerationFailed {
        /// Name or relative path of the sub-block
        block: String,
        /// Why generation failed
        reason: String,
    },

    /// The route entry could not be written into the host routes file.
    ///
    /// Occurs after primary generation already succeeded; files on disk are
    /// not rolled back.
    #[error("Failed to write route entry '{route}' into {file}")]
    RouteWriteFailed {
        /// The route path being injected
        route: String,
        /// The routes file being mutated
        file: String,
        /// Why the write failed
        reason: String,
    },

    /// The container import line could not be appended.
    #[error("Failed to append import for '{block}' into {file}")]
    ContainerWriteFailed {
        /// Block folder name being imported
        block: String,
        /// The container file being mutated
        file: String,
        /// Why the write failed
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for BlockpmError {
    fn clone(&self) -> Self {
        match self {
            Self::InvalidSource {
                locator,
                reason,
            } => Self::InvalidSource {
                locator: locator.clone(),
                reason: reason.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::CloneFailed {
                url,
                reason,
            } => Self::CloneFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::UpdateFailed {
                url,
                reason,
            } => Self::UpdateFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::MissingSourceFiles {
                path,
            } => Self::MissingSourceFiles {
                path: path.clone(),
            },
            Self::ManifestMissing {
                path,
            } => Self::ManifestMissing {
                path: path.clone(),
            },
            Self::ManifestParseError {
                file,
                reason,
            } => Self::ManifestParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::DependencyConflict {
                name,
                wanted,
                existing,
            } => Self::DependencyConflict {
                name: name.clone(),
                wanted: wanted.clone(),
                existing: existing.clone(),
            },
            Self::InstallFailed {
                reason,
            } => Self::InstallFailed {
                reason: reason.clone(),
            },
            Self::GenerationFailed {
                block,
                reason,
            } => Self::GenerationFailed {
                block: block.clone(),
                reason: reason.clone(),
            },
            Self::SubBlockGenerationFailed {
                block,
                reason,
            } => Self::SubBlockGenerationFailed {
                block: block.clone(),
                reason: reason.clone(),
            },
            Self::RouteWriteFailed {
                route,
                file,
                reason,
            } => Self::RouteWriteFailed {
                route: route.clone(),
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ContainerWriteFailed {
                block,
                file,
                reason,
            } => Self::ContainerWriteFailed {
                block: block.clone(),
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON parsing error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// `ErrorContext` wraps a [`BlockpmError`] and adds optional suggestions and
/// details. This is the primary way blockpm presents errors to CLI users:
/// the error itself in red, details in yellow, the suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying blockpm error
    pub error: BlockpmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`BlockpmError`].
    #[must_use]
    pub const fn new(error: BlockpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining why the error occurred.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// This is the main entry point for converting arbitrary errors into helpful
/// CLI output. [`BlockpmError`] variants get tailored suggestions; common
/// [`std::io::Error`] kinds get filesystem guidance; everything else is
/// rendered with its full `anyhow` cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(bpm_error) = error.downcast_ref::<BlockpmError>() {
        return create_error_context(bpm_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(BlockpmError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership or re-run with elevated permissions")
                .with_details("blockpm could not read or write a required file");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(BlockpmError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();

    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(BlockpmError::Other {
        message,
    })
}

/// Map each [`BlockpmError`] variant to an [`ErrorContext`] with tailored
/// suggestions. Used by [`user_friendly_error`] for consistent CLI messages.
fn create_error_context(error: BlockpmError) -> ErrorContext {
    match &error {
        BlockpmError::GitNotFound => ErrorContext::new(error.clone())
            .with_suggestion("Install git with your package manager ('apt install git', 'brew install git') or from https://git-scm.com/")
            .with_details("blockpm shells out to git to fetch remote block repositories"),

        BlockpmError::InvalidSource { locator, .. } => {
            let locator = locator.clone();
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Check the source '{locator}': expected a git URL (https://... or git@host:owner/repo.git) or a local path"
                ))
                .with_details("Remote sources must parse to an owner/repository pair so the cache slot is deterministic")
        }

        BlockpmError::CloneFailed { url, .. } => {
            let url = url.clone();
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Verify the repository URL is correct: {url}. Check your internet connection and repository access"
                ))
                .with_details("A fresh clone has no cached fallback, so clone failures abort the integration")
        }

        BlockpmError::UpdateFailed { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Run 'blockpm cache clean' to drop the stale copy and force a clean clone")
            .with_details("Update failures fall back to the cached files, so the integrated block may be stale"),

        BlockpmError::MissingSourceFiles { path } => {
            let path = path.clone();
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Check that {path} contains the block files, or run 'blockpm cache clean' and retry"
                ))
                .with_details("The host project is never mutated when the block source is absent or corrupt")
        }

        BlockpmError::ManifestMissing { path } => {
            let path = path.clone();
            ErrorContext::new(error.clone())
                .with_suggestion(format!("Add a package.json with a 'name' field at {path}"))
                .with_details("Every block needs a manifest declaring at least its name")
        }

        BlockpmError::InstallFailed { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Re-run with --verbose to see the package-manager output, or retry with --no-deps and install manually")
            .with_details("Generated files are kept; only the dependency step failed"),

        BlockpmError::RouteWriteFailed { file, .. } | BlockpmError::ContainerWriteFailed { file, .. } => {
            let file = file.clone();
            ErrorContext::new(error.clone())
                .with_suggestion(format!("Inspect {file} and add the entry manually, then re-run if needed"))
                .with_details("The block files were already generated; only the wiring step failed")
        }

        _ => ErrorContext::new(error.clone()),
    }
}
