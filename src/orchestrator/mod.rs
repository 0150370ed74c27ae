//! Download orchestration.
//!
//! This module contains the [`Orchestrator`], which drives one item at a time
//! through resolution, fetching, encryption and cataloguing, and the
//! [`OrchestratorBuilder`] used to configure it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hoard::catalog::JsonCatalog;
//! use hoard::crypto::SoftwareKeyProvider;
//! use hoard::download::{DownloadItem, Quality};
//! use hoard::orchestrator::OrchestratorBuilder;
//! use hoard::resolver::StaticResolver;
//! use reqwest::Url;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = StaticResolver::new().with("track-1", Url::parse("https://cdn.example.com/1.flac")?);
//! let orchestrator = OrchestratorBuilder::new(
//!     Arc::new(resolver),
//!     Arc::new(JsonCatalog::open("offline/catalog.json").await?),
//!     Arc::new(SoftwareKeyProvider::open("offline/content.key")),
//! )
//! .directory(PathBuf::from("offline"))
//! .build()?;
//!
//! let record = orchestrator
//!     .download(&DownloadItem::new("track-1", "First Track"), Quality::High)
//!     .await?;
//! let playable = orchestrator.get_playback_file(&record.item_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod orchestrator;

pub use builder::OrchestratorBuilder;
pub use config::OrchestratorConfig;
pub use orchestrator::Orchestrator;
