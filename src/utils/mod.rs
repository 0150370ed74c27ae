//! Shared utility functions.
//!
//! This module contains helpers used by the prober and both fetch paths:
//!
//! - [`content_length`] - `Content-Range` / `Content-Length` parsing
//!
//! # Examples
//!
//! ```rust
//! use hoard::utils::{parse_content_range_total, range_header};
//!
//! assert_eq!(range_header(0, 0), "bytes=0-0");
//! assert_eq!(parse_content_range_total("bytes 0-0/2048"), Some(2048));
//! ```

pub mod content_length;

pub use content_length::{
    content_range, extract_content_length, parse_content_range, parse_content_range_total,
    range_header, ContentRange,
};
