//! Fluent builder for invoking the system `git` binary.
//!
//! Every git invocation in the crate goes through [`GitCommand`], which
//! centralizes argument assembly, timeouts, output capture, and the mapping
//! of nonzero exits into typed errors. The working directory is passed to
//! git with `-C`, so commands never depend on the process's own cwd.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::BlockpmError;

/// Platform-appropriate name of the git executable.
pub const fn git_command() -> &'static str {
    if cfg!(windows) { "git.exe" } else { "git" }
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Builder for one git invocation.
///
/// ```rust,ignore
/// let head = GitCommand::new()
///     .args(["rev-parse", "--abbrev-ref", "HEAD"])
///     .current_dir(&slot)
///     .execute_stdout()
///     .await?;
/// ```
pub struct GitCommand {
    args: Vec<String>,
    dir: Option<PathBuf>,
    timeout_duration: Option<Duration>,
    /// Set by the clone constructors; lets a failed clone report the URL
    /// instead of a raw argument dump.
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            timeout_duration: Some(DEFAULT_TIMEOUT),
            clone_url: None,
        }
    }
}

/// Captured output of a completed git command.
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory the command runs against, passed to git via `-C`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Overrides the default five-minute timeout. `None` disables it.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// The complete argument list handed to git, `-C <dir>` included.
    fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        if let Some(dir) = &self.dir {
            argv.push("-C".to_string());
            argv.push(dir.display().to_string());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Runs the command, capturing output.
    ///
    /// # Errors
    ///
    /// A failed clone maps to [`BlockpmError::CloneFailed`]; any other
    /// nonzero exit or timeout maps to [`BlockpmError::GitCommandError`]
    /// naming the git operation.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let argv = self.argv();
        tracing::debug!(target: "git", "{} {}", git_command(), argv.join(" "));

        let mut cmd = Command::new(git_command());
        cmd.args(&argv).stdout(Stdio::piped()).stderr(Stdio::piped());

        let spawn_context = || format!("failed to run git {}", argv.join(" "));
        let output = match self.timeout_duration {
            Some(limit) => match timeout(limit, cmd.output()).await {
                Ok(result) => result.with_context(spawn_context)?,
                Err(_) => {
                    return Err(BlockpmError::GitCommandError {
                        operation: operation_of(&argv),
                        stderr: format!(
                            "timed out after {}s; the remote may be unreachable or git may \
                             be waiting for credentials (try: git {})",
                            limit.as_secs(),
                            argv.join(" ")
                        ),
                    }
                    .into());
                }
            },
            None => cmd.output().await.with_context(spawn_context)?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "git {} exited with {:?}: {}",
                operation_of(&argv),
                output.status.code(),
                stderr.trim()
            );
            return Err(self.failure(&argv, stdout, stderr).into());
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(target: "git", "{}", stderr.trim());
        }

        Ok(GitCommandOutput { stdout, stderr })
    }

    /// Runs the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        Ok(self.execute().await?.stdout.trim().to_string())
    }

    /// Runs the command, discarding output on success.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await.map(|_| ())
    }

    fn failure(&self, argv: &[String], stdout: String, stderr: String) -> BlockpmError {
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        if operation_of(argv) == "clone" {
            BlockpmError::CloneFailed {
                url: self.clone_url.clone().unwrap_or_else(|| "unknown".to_string()),
                reason: detail,
            }
        } else {
            BlockpmError::GitCommandError {
                operation: operation_of(argv),
                stderr: detail,
            }
        }
    }
}

/// The git operation name in an argument list, skipping a leading `-C <dir>`.
fn operation_of(argv: &[String]) -> String {
    let start = if argv.first().map(String::as_str) == Some("-C") { 2 } else { 0 };
    argv.get(start).cloned().unwrap_or_else(|| "unknown".to_string())
}

// Named constructors for the operations blockpm performs.
impl GitCommand {
    /// Full-history clone of `url` into `target`.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new()
            .args(["clone", "--progress", url])
            .arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Clone that fetches every branch. Needed for `file://` sources, where
    /// git's single-branch default can leave the wanted ref unavailable.
    pub fn clone_all_branches(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new()
            .args(["clone", "--progress", "--no-single-branch", url])
            .arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    pub fn fetch() -> Self {
        Self::new().args(["fetch", "--all", "--tags", "--force"])
    }

    pub fn checkout(ref_name: &str) -> Self {
        Self::new().args(["checkout", ref_name])
    }

    /// Checkout that forces the local branch to `remote_ref`'s tip.
    pub fn checkout_branch(branch_name: &str, remote_ref: &str) -> Self {
        Self::new().args(["checkout", "-B", branch_name, remote_ref])
    }

    pub fn reset_hard() -> Self {
        Self::new().args(["reset", "--hard", "HEAD"])
    }

    pub fn verify_ref(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", ref_name])
    }
}
