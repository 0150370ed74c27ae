//! Progress and notification consumers.
//!
//! The orchestrator publishes to two independent consumers: a cheap,
//! frequent [`ProgressSink`] feeding in-app state, and a coarser
//! [`NotificationSink`] standing in for an OS notification. Both only see
//! updates that already passed the throttles in
//! [`progress::tracker`](crate::progress::tracker).

use crate::download::DownloadProgress;

use tokio::sync::broadcast;

/// Receives progress snapshots for the in-app state stream.
pub trait ProgressSink: Send + Sync {
    /// Publish a snapshot. Must not block.
    fn publish(&self, progress: &DownloadProgress);
}

/// Receives notification level events.
pub trait NotificationSink: Send + Sync {
    /// A download started; progress is indeterminate.
    fn started(&self, item_id: &str, title: &str);
    /// Throttled progress.
    fn progress(&self, item_id: &str, title: &str, percent: u8);
    /// The item is stored.
    fn completed(&self, item_id: &str, title: &str);
    /// The download failed.
    fn failed(&self, item_id: &str, title: &str, message: &str);
    /// Dismiss whatever is shown for the item.
    fn cancel(&self, item_id: &str);
}

/// Fans progress snapshots out to any number of subscribers.
///
/// Slow subscribers lose the oldest snapshots rather than blocking downloads.
#[derive(Debug, Clone)]
pub struct BroadcastProgressSink {
    sender: broadcast::Sender<DownloadProgress>,
}

impl BroadcastProgressSink {
    /// Create a sink buffering up to `capacity` snapshots per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to snapshots published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadProgress> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgressSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressSink for BroadcastProgressSink {
    fn publish(&self, progress: &DownloadProgress) {
        // No subscribers is fine.
        let _ = self.sender.send(progress.clone());
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _progress: &DownloadProgress) {}
}

impl NotificationSink for NullSink {
    fn started(&self, _item_id: &str, _title: &str) {}
    fn progress(&self, _item_id: &str, _title: &str, _percent: u8) {}
    fn completed(&self, _item_id: &str, _title: &str) {}
    fn failed(&self, _item_id: &str, _title: &str, _message: &str) {}
    fn cancel(&self, _item_id: &str) {}
}
