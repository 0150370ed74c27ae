//! Builder pattern implementation for creating [`Orchestrator`] instances.
//!
//! The three collaborators every orchestrator needs (stream resolver,
//! catalog and key provider) are passed to [`OrchestratorBuilder::new`];
//! everything else has a default and a chained setter.
//!
//! # Examples
//!
//! ```rust
//! use hoard::catalog::MemoryCatalog;
//! use hoard::crypto::SoftwareKeyProvider;
//! use hoard::orchestrator::OrchestratorBuilder;
//! use hoard::resolver::StaticResolver;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # fn example() -> hoard::Result<()> {
//! let orchestrator = OrchestratorBuilder::new(
//!     Arc::new(StaticResolver::new()),
//!     Arc::new(MemoryCatalog::new()),
//!     Arc::new(SoftwareKeyProvider::ephemeral()),
//! )
//! .directory(PathBuf::from("offline"))
//! .retries(5)
//! .build()?;
//! # Ok(())
//! # }
//! ```

use super::{config::OrchestratorConfig, orchestrator::Orchestrator};
use crate::catalog::Catalog;
use crate::crypto::KeyProvider;
use crate::error::Result;
use crate::fetch::SegmentSettings;
use crate::http::{HttpClientConfig, RetryPolicy};
use crate::progress::ThrottleSettings;
use crate::resolver::StreamResolver;
use crate::sink::{NotificationSink, NullSink, ProgressSink};

use reqwest::header::{HeaderMap, HeaderValue, IntoHeaderName};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A builder used to create an [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    resolver: Arc<dyn StreamResolver>,
    catalog: Arc<dyn Catalog>,
    keys: Arc<dyn KeyProvider>,
    progress: Arc<dyn ProgressSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl OrchestratorBuilder {
    /// Creates a builder with the default options.
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        catalog: Arc<dyn Catalog>,
        keys: Arc<dyn KeyProvider>,
    ) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            resolver,
            catalog,
            keys,
            progress: Arc::new(NullSink),
            notifications: Arc::new(NullSink),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the directory where to store the encrypted downloads.
    pub fn directory(mut self, directory: PathBuf) -> Self {
        self.config.directory = directory;
        self
    }

    /// Sets the directory where decrypted playback files are written.
    pub fn playback_directory(mut self, directory: PathBuf) -> Self {
        self.config.playback_directory = directory;
        self
    }

    /// Set the number of attempts per request, the first one included.
    pub fn retries(mut self, max_attempts: u32) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self
    }

    /// Set the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the HTTP client configuration.
    pub fn http_config(mut self, http: HttpClientConfig) -> Self {
        self.config.http = http;
        self
    }

    /// Set a proxy for every request.
    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.config.http.proxy = Some(proxy);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = Some(timeout);
        self
    }

    /// Helper method to get or create a new HeaderMap.
    fn new_header(&self) -> HeaderMap {
        match self.config.http.headers {
            Some(ref h) => h.to_owned(),
            _ => HeaderMap::new(),
        }
    }

    /// Add the http headers.
    ///
    /// You can call `.headers()` multiple times and all `HeaderMap` will be
    /// merged into a single one.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        let mut new = self.new_header();
        new.extend(headers);

        self.config.http.headers = Some(new);
        self
    }

    /// Add the http header.
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        let mut new = self.new_header();

        new.insert(name, value);

        self.config.http.headers = Some(new);
        self
    }

    /// Set the segmented download thresholds.
    pub fn segment_settings(mut self, segments: SegmentSettings) -> Self {
        self.config.segments = segments;
        self
    }

    /// Smallest resource for which a segmented download is attempted.
    pub fn parallel_threshold(mut self, bytes: u64) -> Self {
        self.config.segments.parallel_threshold = bytes;
        self
    }

    /// Set the write buffer size of the fetch paths.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes.max(1);
        self
    }

    /// Set the plaintext chunk size of the container codec.
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes.max(1);
        self
    }

    /// Set the progress throttles.
    pub fn throttle(mut self, throttle: ThrottleSettings) -> Self {
        self.config.throttle = throttle;
        self
    }

    /// Set the consumer of in-app progress snapshots.
    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Set the consumer of notification events.
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifications = sink;
        self
    }

    /// Create the [`Orchestrator`] with the specified options.
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn build(self) -> Result<Orchestrator> {
        Orchestrator::new(
            self.config,
            self.resolver,
            self.catalog,
            self.keys,
            self.progress,
            self.notifications,
        )
    }
}
