//! Progress aggregation shared by download workers.
//!
//! Every worker adds the bytes it receives to a single atomic counter. After
//! each increment the worker asks the tracker whether an update is due; that
//! read-compare-write happens under a short lock that is never held across
//! I/O. Two throttles gate what leaves the tracker:
//!
//! - UI updates: on any percent change, after [`ThrottleSettings::ui_interval`],
//!   or when the byte count reaches the total.
//! - Notification updates: every [`ThrottleSettings::notification_step`]
//!   points, or once the capped percentage is reached.

use crate::download::status::{download_percent, DOWNLOAD_PERCENT_CAP};

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Throttling thresholds for progress consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSettings {
    /// Longest time between UI updates while bytes keep arriving.
    pub ui_interval: Duration,
    /// Percentage points between notification updates.
    pub notification_step: u8,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            ui_interval: Duration::from_millis(500),
            notification_step: 10,
        }
    }
}

/// An update that passed one of the throttles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// For the in-app progress stream.
    Ui {
        downloaded: u64,
        total: u64,
        percent: u8,
    },
    /// For the OS level notification.
    Notification { percent: u8 },
}

/// Callback receiving throttled progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Debug, Default)]
struct ReportState {
    ui_percent: u8,
    ui_at: Option<Instant>,
    notified_percent: u8,
}

/// Aggregates bytes from concurrent workers and throttles progress events.
pub struct ProgressTracker {
    total: AtomicU64,
    downloaded: AtomicU64,
    settings: ThrottleSettings,
    state: Mutex<ReportState>,
    callback: ProgressCallback,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total())
            .field("downloaded", &self.downloaded())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ProgressTracker {
    /// Create a tracker for a download of `total` bytes (`0` if unknown).
    pub fn new(total: u64, settings: ThrottleSettings, callback: ProgressCallback) -> Self {
        Self {
            total: AtomicU64::new(total),
            downloaded: AtomicU64::new(0),
            settings,
            state: Mutex::new(ReportState::default()),
            callback,
        }
    }

    /// A tracker that reports nowhere.
    pub fn silent() -> Self {
        Self::new(0, ThrottleSettings::default(), Arc::new(|_| {}))
    }

    /// Total size in bytes, `0` if unknown.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Bytes counted so far.
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    /// Set the total once it becomes known.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    /// Count `bytes` received by a worker and emit any update that is due.
    pub fn add(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::AcqRel);
        self.report();
    }

    /// Take back bytes from a worker whose attempt is being retried.
    pub fn rollback(&self, bytes: u64) {
        let _ = self
            .downloaded
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| {
                Some(d.saturating_sub(bytes))
            });
    }

    /// Restart byte counting, for a fallback attempt.
    ///
    /// Already reported percentages are kept so consumers never see them
    /// go backwards.
    pub fn reset(&self) {
        self.downloaded.store(0, Ordering::Release);
    }

    fn report(&self) {
        let downloaded = self.downloaded();
        let total = self.total();
        let percent = download_percent(downloaded, total);
        let now = Instant::now();

        let (ui, notify) = {
            let mut state = self.state.lock();

            let interval_elapsed = state
                .ui_at
                .map_or(true, |at| now.duration_since(at) >= self.settings.ui_interval);
            let complete = total > 0 && downloaded >= total;
            let ui = percent > state.ui_percent || interval_elapsed || complete;
            if ui {
                state.ui_percent = state.ui_percent.max(percent);
                state.ui_at = Some(now);
            }

            let step = self.settings.notification_step.max(1);
            let notify = percent > state.notified_percent
                && (percent >= state.notified_percent.saturating_add(step)
                    || percent >= DOWNLOAD_PERCENT_CAP);
            if notify {
                state.notified_percent = percent;
            }

            (ui.then_some(state.ui_percent), notify.then_some(percent))
        };

        if let Some(percent) = ui {
            (self.callback)(ProgressEvent::Ui {
                downloaded,
                total,
                percent,
            });
        }
        if let Some(percent) = notify {
            (self.callback)(ProgressEvent::Notification { percent });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(settings: ThrottleSettings, total: u64) -> (ProgressTracker, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let tracker = ProgressTracker::new(
            total,
            settings,
            Arc::new(move |e: ProgressEvent| sink.lock().push(e)),
        );
        (tracker, events)
    }

    fn slow_ui() -> ThrottleSettings {
        ThrottleSettings {
            ui_interval: Duration::from_secs(3600),
            notification_step: 10,
        }
    }

    #[test]
    fn test_ui_updates_on_percent_change_only() {
        let (tracker, events) = recording(slow_ui(), 1000);
        tracker.add(1); // first report always passes the interval check
        tracker.add(1); // same percent, interval not elapsed
        tracker.add(8); // 1%
        let ui: Vec<_> = events
            .lock()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Ui { .. }))
            .cloned()
            .collect();
        assert_eq!(ui.len(), 2);
        assert_eq!(
            ui[1],
            ProgressEvent::Ui {
                downloaded: 10,
                total: 1000,
                percent: 1
            }
        );
    }

    #[test]
    fn test_notifications_every_step() {
        let (tracker, events) = recording(slow_ui(), 100);
        for _ in 0..100 {
            tracker.add(1);
        }
        let notified: Vec<u8> = events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Notification { percent } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(notified, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 98]);
    }

    #[test]
    fn test_ui_percent_never_decreases_after_reset() {
        let (tracker, events) = recording(ThrottleSettings::default(), 100);
        tracker.add(60);
        tracker.reset();
        tracker.add(10);
        for e in events.lock().iter() {
            if let ProgressEvent::Ui { percent, .. } = e {
                assert_eq!(*percent, 60);
            }
        }
        assert_eq!(tracker.downloaded(), 10);
    }

    #[test]
    fn test_rollback_saturates() {
        let tracker = ProgressTracker::silent();
        tracker.add(5);
        tracker.rollback(10);
        assert_eq!(tracker.downloaded(), 0);
    }

    #[test]
    fn test_unknown_total_reports_zero_percent() {
        let (tracker, events) = recording(ThrottleSettings::default(), 0);
        tracker.add(500);
        assert_eq!(
            events.lock()[0],
            ProgressEvent::Ui {
                downloaded: 500,
                total: 0,
                percent: 0
            }
        );
    }
}
