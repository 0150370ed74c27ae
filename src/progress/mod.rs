//! Progress module containing progress aggregation and display.
//!
//! This module provides the byte counting and throttling shared by the
//! download workers, plus a terminal based notification sink.
//!
//! # Overview
//!
//! - `tracker` - Atomic byte aggregation and the UI / notification throttles
//! - `style` - Progress bar styling options and templates
//! - `display` - [`ConsoleNotifier`], one progress bar per in-flight item
//!
//! # Examples
//!
//! ```rust
//! use hoard::progress::{ProgressEvent, ProgressTracker, ThrottleSettings};
//! use std::sync::Arc;
//!
//! let tracker = ProgressTracker::new(
//!     1024,
//!     ThrottleSettings::default(),
//!     Arc::new(|event| {
//!         if let ProgressEvent::Notification { percent } = event {
//!             println!("{}%", percent);
//!         }
//!     }),
//! );
//! tracker.add(512);
//! assert_eq!(tracker.downloaded(), 512);
//! ```

pub mod display;
pub mod style;
pub mod tracker;

pub use display::ConsoleNotifier;
pub use style::ProgressBarOpts;
pub use tracker::{ProgressCallback, ProgressEvent, ProgressTracker, ThrottleSettings};
