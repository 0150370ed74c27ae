//! Download data model.
//!
//! This module provides the types shared between the orchestrator and its
//! collaborators:
//!
//! - [`item`] - The item being taken offline and its requested quality tier
//! - [`record`] - The catalog record written once an item is stored
//! - [`status`] - The per-item state machine and progress snapshots
//!
//! # Examples
//!
//! ```rust
//! use hoard::download::{DownloadItem, Quality};
//!
//! let item = DownloadItem::new("track/42", "The Answer");
//! assert_eq!(item.file_stem(), "747261636b2f3432");
//! assert_eq!(Quality::default(), Quality::Normal);
//! ```

pub mod item;
pub mod record;
pub mod status;

pub use item::{DownloadItem, Quality};
pub use record::DownloadRecord;
pub use status::{DownloadProgress, Status};
