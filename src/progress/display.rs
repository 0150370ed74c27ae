//! Console notification display.
//!
//! [`ConsoleNotifier`] is a [`NotificationSink`] that draws one `indicatif`
//! bar per in-flight item, for command line hosts that have no OS
//! notification surface.
//!
//! # Examples
//!
//! ```rust
//! use hoard::progress::{ConsoleNotifier, ProgressBarOpts};
//! use hoard::sink::NotificationSink;
//!
//! let notifier = ConsoleNotifier::new(ProgressBarOpts::hidden());
//! notifier.started("track-1", "First Track");
//! notifier.progress("track-1", "First Track", 40);
//! notifier.completed("track-1", "First Track");
//! assert_eq!(notifier.active(), 0);
//! ```

use crate::progress::ProgressBarOpts;
use crate::sink::NotificationSink;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Draws download notifications as terminal progress bars.
pub struct ConsoleNotifier {
    /// The multi-progress instance coordinating the bars.
    multi: MultiProgress,
    /// One bar per item currently shown.
    bars: Mutex<HashMap<String, ProgressBar>>,
    /// Style options for the bars.
    opts: ProgressBarOpts,
}

impl ConsoleNotifier {
    /// Create a notifier drawing bars styled by `opts`.
    pub fn new(opts: ProgressBarOpts) -> Self {
        let multi = match opts.is_enabled() {
            true => MultiProgress::new(),
            false => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            opts,
        }
    }

    /// Number of items currently shown.
    pub fn active(&self) -> usize {
        self.bars.lock().len()
    }

    fn take(&self, item_id: &str) -> Option<ProgressBar> {
        self.bars.lock().remove(item_id)
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new(ProgressBarOpts::default())
    }
}

impl NotificationSink for ConsoleNotifier {
    fn started(&self, item_id: &str, title: &str) {
        let pb = self.multi.add(self.opts.clone().to_progress_bar(100));
        pb.set_message(title.to_string());
        pb.tick();
        if let Some(old) = self.bars.lock().insert(item_id.to_string(), pb) {
            old.finish_and_clear();
        }
    }

    fn progress(&self, item_id: &str, _title: &str, percent: u8) {
        if let Some(pb) = self.bars.lock().get(item_id) {
            pb.set_position(u64::from(percent.min(100)));
        }
    }

    fn completed(&self, item_id: &str, title: &str) {
        if let Some(pb) = self.take(item_id) {
            pb.set_position(100);
            if self.opts.clear {
                pb.finish_and_clear();
            } else {
                pb.finish_with_message(format!("{} (downloaded)", title));
            }
        }
    }

    fn failed(&self, item_id: &str, title: &str, message: &str) {
        if let Some(pb) = self.take(item_id) {
            pb.abandon_with_message(format!("Download Failed: {}: {}", title, message));
        }
    }

    fn cancel(&self, item_id: &str) {
        if let Some(pb) = self.take(item_id) {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_are_tracked_per_item() {
        let notifier = ConsoleNotifier::new(ProgressBarOpts::hidden());
        notifier.started("a", "A");
        notifier.started("b", "B");
        assert_eq!(notifier.active(), 2);

        notifier.progress("a", "A", 50);
        notifier.failed("a", "A", "network down");
        assert_eq!(notifier.active(), 1);

        notifier.cancel("b");
        assert_eq!(notifier.active(), 0);

        // Unknown items are ignored.
        notifier.progress("zzz", "Z", 10);
        notifier.completed("zzz", "Z");
    }

    #[test]
    fn test_restart_replaces_bar() {
        let notifier = ConsoleNotifier::new(ProgressBarOpts::hidden());
        notifier.started("a", "A");
        notifier.started("a", "A");
        assert_eq!(notifier.active(), 1);
    }
}
