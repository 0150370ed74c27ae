//! Download status and progress snapshots.
//!
//! This module contains the [`Status`] state machine and the
//! [`DownloadProgress`] snapshot published while an item is in flight.
//!
//! # Examples
//!
//! ```rust
//! use hoard::download::{DownloadItem, DownloadProgress, Status};
//!
//! let item = DownloadItem::new("track-1", "First Track");
//! let progress = DownloadProgress::pending(&item)
//!     .with_status(Status::Downloading)
//!     .with_bytes(512, 1024);
//!
//! assert_eq!(progress.percent, 50);
//! assert!(!progress.status.is_terminal());
//! ```

use super::item::DownloadItem;
use serde::{Deserialize, Serialize};

/// Highest percentage reported while bytes are still being fetched.
pub const DOWNLOAD_PERCENT_CAP: u8 = 98;
/// Percentage reported once the payload is on disk and encryption runs.
pub const ENCRYPTING_PERCENT: u8 = 99;

/// Download status.
///
/// `Pending -> Downloading -> {Completed | Failed}`, with `Cancelled`
/// reachable from the two non-terminal states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Accepted, resolving the stream URL.
    Pending,
    /// Bytes are being fetched or encrypted.
    Downloading,
    /// Stored and recorded in the catalog.
    Completed,
    /// Failed with an error message.
    Failed(String),
    /// Cancelled by the user.
    Cancelled,
}

impl Status {
    /// Return `true` for states that end a download.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Completed | Status::Failed(_) | Status::Cancelled
        )
    }
}

/// Snapshot of an in-flight download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Identifier of the item.
    pub item_id: String,
    /// Title of the item.
    pub title: String,
    /// Percentage in `0..=100`.
    pub percent: u8,
    /// Bytes fetched so far.
    pub downloaded_bytes: u64,
    /// Total size, `0` when unknown.
    pub total_bytes: u64,
    /// Current status.
    pub status: Status,
}

impl DownloadProgress {
    /// A fresh snapshot in the [`Status::Pending`] state.
    pub fn pending(item: &DownloadItem) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            percent: 0,
            downloaded_bytes: 0,
            total_bytes: 0,
            status: Status::Pending,
        }
    }

    /// Attach a status.
    pub fn with_status(self, status: Status) -> Self {
        Self { status, ..self }
    }

    /// Update the byte counters, deriving the percentage from them.
    ///
    /// The percentage never decreases and stays at or below
    /// [`DOWNLOAD_PERCENT_CAP`].
    pub fn with_bytes(self, downloaded: u64, total: u64) -> Self {
        let percent = self.percent.max(download_percent(downloaded, total));
        Self {
            downloaded_bytes: downloaded,
            total_bytes: total,
            percent,
            ..self
        }
    }

    /// Set the percentage, never moving it backwards.
    pub fn with_percent(self, percent: u8) -> Self {
        Self {
            percent: self.percent.max(percent.min(100)),
            ..self
        }
    }

    /// Mark the snapshot as failed with a message.
    pub fn fail(self, msg: impl std::fmt::Display) -> Self {
        self.with_status(Status::Failed(format!("{}", msg)))
    }
}

/// Percentage of a download, capped until the file is stored.
pub fn download_percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = downloaded.saturating_mul(100) / total;
    percent.min(DOWNLOAD_PERCENT_CAP as u64) as u8
}
