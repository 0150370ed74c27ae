//! Progress bar styling options.
//!
//! This module provides [`ProgressBarOpts`] for customizing the bars drawn by
//! the [`ConsoleNotifier`](super::ConsoleNotifier).
//!
//! # Examples
//!
//! ```rust
//! use hoard::progress::ProgressBarOpts;
//!
//! // Use a predefined style
//! let opts = ProgressBarOpts::with_line_style();
//!
//! // Or build a custom one
//! let custom = ProgressBarOpts::new(
//!     Some("{msg} {bar:40.cyan/blue} {pos}%".to_string()),
//!     Some(ProgressBarOpts::CHARS_FINE.to_string()),
//!     true,
//!     false,
//! );
//! ```

use indicatif::{ProgressBar, ProgressStyle};

/// Define the options for a progress bar.
#[derive(Debug, Clone)]
pub struct ProgressBarOpts {
    /// Progress bar template string.
    template: Option<String>,
    /// Progression characters set.
    ///
    /// There must be at least 3 characters for the following states:
    /// "filled", "current", and "to do".
    progress_chars: Option<String>,
    /// Enable or disable the progress bar.
    pub(crate) enabled: bool,
    /// Clear the progress bar once completed.
    pub(crate) clear: bool,
}

impl Default for ProgressBarOpts {
    fn default() -> Self {
        Self {
            template: Some(ProgressBarOpts::TEMPLATE_PERCENT.into()),
            progress_chars: Some(ProgressBarOpts::CHARS_FINE.into()),
            enabled: true,
            clear: false,
        }
    }
}

impl ProgressBarOpts {
    /// Template showing the item title, a bar and the percentage.
    ///
    /// `Song title           ███████████████▋           52%`
    pub const TEMPLATE_PERCENT: &'static str = "{msg:30!} {bar:40.blue} {pos:>3}%";
    /// Template using a line, in the green tones of pip.
    pub const TEMPLATE_LINE: &'static str = "{msg:30!} {bar:40.green/black} {pos:>3}%";
    /// Use fine blocks as progress characters: `"█▉▊▋▌▍▎▏  "`.
    pub const CHARS_FINE: &'static str = "█▉▊▋▌▍▎▏  ";
    /// Use a line as progress characters: `"━╾─"`.
    pub const CHARS_LINE: &'static str = "━╾╴─";

    /// Create a new [`ProgressBarOpts`].
    pub fn new(
        template: Option<String>,
        progress_chars: Option<String>,
        enabled: bool,
        clear: bool,
    ) -> Self {
        Self {
            template,
            progress_chars,
            enabled,
            clear,
        }
    }

    /// Create a [`ProgressStyle`] based on the provided options.
    ///
    /// An invalid template falls back to the default bar.
    pub fn to_progress_style(self) -> ProgressStyle {
        let mut style = ProgressStyle::default_bar();
        if let Some(template) = self.template {
            if let Ok(templated) = ProgressStyle::default_bar().template(&template) {
                style = templated;
            }
        }
        if let Some(progress_chars) = self.progress_chars {
            style = style.progress_chars(&progress_chars);
        }
        style
    }

    /// Create a [`ProgressBar`] based on the provided options.
    pub fn to_progress_bar(self, len: u64) -> ProgressBar {
        // Return a hidden Progress bar if we disabled it.
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let style = self.to_progress_style();
        ProgressBar::new(len).with_style(style)
    }

    /// Create a new [`ProgressBarOpts`] drawn with a line.
    pub fn with_line_style() -> Self {
        Self {
            template: Some(ProgressBarOpts::TEMPLATE_LINE.into()),
            progress_chars: Some(ProgressBarOpts::CHARS_LINE.into()),
            enabled: true,
            clear: true,
        }
    }

    /// Set to `true` to clear the progress bar upon completion.
    pub fn set_clear(&mut self, clear: bool) {
        self.clear = clear;
    }

    /// Return `true` if bars are drawn.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Create a new [`ProgressBarOpts`] which hides the progress bars.
    pub fn hidden() -> Self {
        Self {
            enabled: false,
            ..ProgressBarOpts::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar() {
        let pb = ProgressBarOpts::hidden().to_progress_bar(100);
        assert!(pb.is_hidden());
    }

    #[test]
    fn test_invalid_template_falls_back() {
        let opts = ProgressBarOpts::new(Some("{bar:".into()), None, true, false);
        let pb = opts.to_progress_bar(100);
        assert_eq!(pb.length(), Some(100));
    }

    #[test]
    fn test_set_clear() {
        let mut opts = ProgressBarOpts::default();
        assert!(!opts.clear);
        opts.set_clear(true);
        assert!(opts.clear);
    }
}
