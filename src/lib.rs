//! Hoard is a crate taking remote audio offline: it fetches a resource over
//! HTTP(S), stores it encrypted at rest, and serves it back for playback.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hoard::{
//!     catalog::MemoryCatalog, crypto::SoftwareKeyProvider, resolver::StaticResolver,
//!     DownloadItem, Error, OrchestratorBuilder, Quality,
//! };
//! use reqwest::Url;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Error> {
//! let url = Url::parse("https://cdn.example.com/track-1.flac")
//!     .map_err(|e| Error::InvalidUrl(e.to_string()))?;
//! let orchestrator = OrchestratorBuilder::new(
//!     Arc::new(StaticResolver::new().with("track-1", url)),
//!     Arc::new(MemoryCatalog::new()),
//!     Arc::new(SoftwareKeyProvider::ephemeral()),
//! )
//! .directory(PathBuf::from("offline"))
//! .build()?;
//!
//! let item = DownloadItem::new("track-1", "First Track");
//! orchestrator.download(&item, Quality::High).await?;
//! let playable = orchestrator.get_playback_file("track-1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! The hoard crate is organized into several modules:
//!
//! - [`orchestrator`] - The `Orchestrator` and `OrchestratorBuilder` driving downloads
//! - [`fetch`] - Segmented and sequential fetch paths
//! - [`crypto`] - Streaming authenticated encryption and the container format
//! - [`download`] - Items, catalog records, status and progress snapshots
//! - [`catalog`] - The catalog store and its implementations
//! - [`resolver`] - Stream URL resolution
//! - [`sink`] - Progress and notification consumers
//! - [`error`] - Centralized error handling with the `Error` enum
//! - [`http`] - HTTP client, range probing and the retry policy
//! - [`progress`] - Progress aggregation and console display
//! - [`utils`] - Shared utility functions

pub mod catalog;
pub mod crypto;
pub mod download;
pub mod error;
pub mod fetch;
pub mod http;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod sink;
pub mod utils;

pub use catalog::{Catalog, JsonCatalog, MemoryCatalog};
pub use crypto::{ContainerCodec, KeyProvider, SoftwareKeyProvider};
pub use download::{DownloadItem, DownloadProgress, DownloadRecord, Quality, Status};
pub use error::{Error, Result};
pub use http::{create_http_client, HttpClientConfig, RetryPolicy};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};
pub use progress::{ConsoleNotifier, ProgressBarOpts};
pub use resolver::{StaticResolver, StreamResolver};
pub use sink::{BroadcastProgressSink, NotificationSink, NullSink, ProgressSink};
pub use utils::content_length::{
    extract_content_length, parse_content_range, parse_content_range_total,
};
