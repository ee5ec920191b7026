//! Spinner support for long-running pipeline stages.
//!
//! Wraps the `indicatif` spinner with blockpm styling and automatic
//! suppression: set `BLOCKPM_NO_PROGRESS` (the `--no-progress` flag does this)
//! to get plain log output instead of animations. The integration pipeline
//! itself never touches these types; the CLI drives a spinner from the
//! structured progress events.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

fn is_progress_disabled() -> bool {
    std::env::var("BLOCKPM_NO_PROGRESS").is_ok()
}

/// A spinner with consistent styling and environment-aware suppression.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a spinner for indeterminate progress operations.
    ///
    /// When progress output is disabled the returned spinner is hidden and
    /// silently ignores all operations.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Sets the message displayed alongside the spinner.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Completes the spinner, leaving a final message on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Completes the spinner and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_respects_disable_env() {
        // Safe because tests in this module run in one process; spawning a
        // hidden spinner must not panic either way.
        unsafe { std::env::set_var("BLOCKPM_NO_PROGRESS", "1") };
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("working");
        spinner.finish_and_clear();
        unsafe { std::env::remove_var("BLOCKPM_NO_PROGRESS") };
    }
}
