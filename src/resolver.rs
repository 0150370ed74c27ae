//! Stream URL resolution.
//!
//! A [`StreamResolver`] turns an item id and a [`Quality`] hint into a
//! short-lived HTTP(S) URL. Its own retries are its business; the
//! orchestrator treats any error as a failed download.

use crate::download::Quality;
use crate::error::{Error, Result};

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;

/// Resolves the URL an item can be fetched from.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Return the URL for `item_id` at `quality`.
    ///
    /// Implementations report failures as [`Error::Resolve`].
    async fn resolve(&self, item_id: &str, quality: Quality) -> Result<Url>;
}

/// Resolves from a fixed table, ignoring the quality hint.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    urls: HashMap<String, Url>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the URL for `item_id`.
    pub fn with(mut self, item_id: impl Into<String>, url: Url) -> Self {
        self.urls.insert(item_id.into(), url);
        self
    }
}

#[async_trait]
impl StreamResolver for StaticResolver {
    async fn resolve(&self, item_id: &str, _quality: Quality) -> Result<Url> {
        self.urls
            .get(item_id)
            .cloned()
            .ok_or_else(|| Error::Resolve(format!("no stream URL for {}", item_id)))
    }
}
