//! HTTP module containing transport functionality.
//!
//! This module provides HTTP client setup, the retry policy shared by both
//! download paths, and range capability probing.
//!
//! # Overview
//!
//! - [`client`] - HTTP client creation and middleware configuration
//! - [`retry`] - Error classification, backoff and retrying execution
//! - [`probe`] - Range support and size detection with a one byte request
//!
//! # Examples
//!
//! ```rust,no_run
//! use hoard::http::{create_http_client, probe, HttpClientConfig};
//! use reqwest::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = create_http_client(HttpClientConfig::default())?;
//! let url = Url::parse("https://cdn.example.com/track.flac")?;
//! let result = probe(&client, &url).await;
//! println!("ranges: {}, size: {:?}", result.supports_ranges, result.total_bytes);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod probe;
pub mod retry;

pub use client::{create_http_client, HttpClientConfig};
pub use probe::{probe, RangeProbe};
pub use retry::{classify, RetryPolicy};
