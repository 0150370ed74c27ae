#![allow(dead_code)]

use async_trait::async_trait;
use hoard::catalog::{Catalog, MemoryCatalog};
use hoard::crypto::SoftwareKeyProvider;
use hoard::download::{DownloadProgress, DownloadRecord, Quality};
use hoard::fetch::{FetchContext, SegmentSettings};
use hoard::http::{create_http_client, HttpClientConfig, RetryPolicy};
use hoard::progress::ThrottleSettings;
use hoard::resolver::{StaticResolver, StreamResolver};
use hoard::sink::{NotificationSink, ProgressSink};
use hoard::{Error, OrchestratorBuilder, Result};
use parking_lot::Mutex;
use rand::RngCore;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

pub const MIB: usize = 1024 * 1024;

/// Creates a temporary directory for testing purposes
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Creates a temporary file with the given content
pub fn create_temp_file(dir: &Path, filename: &str, content: &[u8]) -> PathBuf {
    let file_path = dir.join(filename);
    fs::write(&file_path, content).expect("Failed to write temporary file");
    file_path
}

/// Creates random test content of specified size
pub fn create_test_content(size: usize) -> Vec<u8> {
    let mut content = vec![0u8; size];
    rand::rng().fill_bytes(&mut content);
    content
}

/// Asserts that a file has the expected size
pub fn assert_file_size(path: &Path, expected_size: u64) {
    let metadata = fs::metadata(path).expect("Failed to get file metadata");
    assert_eq!(
        metadata.len(),
        expected_size,
        "File size mismatch at path: {:?}",
        path
    );
}

/// Number of entries in a directory, 0 if it does not exist.
pub fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Log to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A retry policy fast enough for tests.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(5))
}

/// A client that never goes through a proxy.
pub fn create_test_client() -> ClientWithMiddleware {
    create_http_client(HttpClientConfig {
        system_proxy: false,
        ..HttpClientConfig::default()
    })
    .expect("Failed to create HTTP client")
}

/// A fetch context with a fast retry policy.
pub fn create_fetch_context() -> FetchContext {
    FetchContext {
        retry: fast_retry(3),
        ..FetchContext::new(create_test_client())
    }
}

/// Segment settings that segment anything of at least 1 KiB.
pub fn small_segments() -> SegmentSettings {
    SegmentSettings {
        parallel_threshold: 1024,
        max_segments: 4,
        min_segment_size: 256,
    }
}

// === Collaborators ===

/// Records every progress snapshot.
#[derive(Default)]
pub struct RecordingProgress {
    pub snapshots: Mutex<Vec<DownloadProgress>>,
}

impl ProgressSink for RecordingProgress {
    fn publish(&self, progress: &DownloadProgress) {
        self.snapshots.lock().push(progress.clone());
    }
}

impl RecordingProgress {
    pub fn for_item(&self, item_id: &str) -> Vec<DownloadProgress> {
        self.snapshots
            .lock()
            .iter()
            .filter(|p| p.item_id == item_id)
            .cloned()
            .collect()
    }
}

/// Records notification events as strings.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

impl NotificationSink for RecordingNotifier {
    fn started(&self, item_id: &str, _title: &str) {
        self.events.lock().push(format!("started:{}", item_id));
    }

    fn progress(&self, item_id: &str, _title: &str, percent: u8) {
        self.events.lock().push(format!("progress:{}:{}", item_id, percent));
    }

    fn completed(&self, item_id: &str, _title: &str) {
        self.events.lock().push(format!("completed:{}", item_id));
    }

    fn failed(&self, item_id: &str, _title: &str, message: &str) {
        self.events.lock().push(format!("failed:{}:{}", item_id, message));
    }

    fn cancel(&self, item_id: &str) {
        self.events.lock().push(format!("cancel:{}", item_id));
    }
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

/// A memory catalog counting inserts.
#[derive(Default)]
pub struct CountingCatalog {
    pub inner: MemoryCatalog,
    pub inserts: AtomicUsize,
}

impl CountingCatalog {
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for CountingCatalog {
    async fn get(&self, item_id: &str) -> Result<Option<DownloadRecord>> {
        self.inner.get(item_id).await
    }

    async fn insert(&self, record: DownloadRecord) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(record).await
    }

    async fn delete(&self, item_id: &str) -> Result<bool> {
        self.inner.delete(item_id).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    async fn total_size(&self) -> Result<u64> {
        self.inner.total_size().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        self.inner.list_all().await
    }
}

/// A memory catalog whose inserts wait until released.
#[derive(Default)]
pub struct GatedCatalog {
    pub inner: MemoryCatalog,
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Catalog for GatedCatalog {
    async fn get(&self, item_id: &str) -> Result<Option<DownloadRecord>> {
        self.inner.get(item_id).await
    }

    async fn insert(&self, record: DownloadRecord) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.insert(record).await
    }

    async fn delete(&self, item_id: &str) -> Result<bool> {
        self.inner.delete(item_id).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    async fn total_size(&self) -> Result<u64> {
        self.inner.total_size().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        self.inner.list_all().await
    }
}

/// A resolver that always fails.
pub struct FailingResolver(pub &'static str);

#[async_trait]
impl StreamResolver for FailingResolver {
    async fn resolve(&self, _item_id: &str, _quality: Quality) -> Result<Url> {
        Err(Error::Resolve(self.0.to_string()))
    }
}

/// Everything an orchestrator test needs to inspect.
pub struct Harness {
    pub dir: TempDir,
    pub catalog: Arc<CountingCatalog>,
    pub progress: Arc<RecordingProgress>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: create_temp_dir(),
            catalog: Arc::new(CountingCatalog::default()),
            progress: Arc::new(RecordingProgress::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn offline_dir(&self) -> PathBuf {
        self.dir.path().join("offline")
    }

    pub fn playback_dir(&self) -> PathBuf {
        self.dir.path().join("playback")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.offline_dir().join(".partial")
    }

    /// A builder wired to the harness, resolving `item_id` to `url`.
    pub fn builder(&self, item_id: &str, url: Url) -> OrchestratorBuilder {
        self.builder_with(Arc::new(StaticResolver::new().with(item_id, url)))
    }

    pub fn builder_with(&self, resolver: Arc<dyn StreamResolver>) -> OrchestratorBuilder {
        self.builder_with_catalog(resolver, self.catalog.clone())
    }

    /// A builder wired to the harness sinks and directories but storing
    /// records in `catalog`.
    pub fn builder_with_catalog(
        &self,
        resolver: Arc<dyn StreamResolver>,
        catalog: Arc<dyn Catalog>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder::new(resolver, catalog, Arc::new(SoftwareKeyProvider::ephemeral()))
            .directory(self.offline_dir())
            .playback_directory(self.playback_dir())
            .http_config(HttpClientConfig {
                system_proxy: false,
                ..HttpClientConfig::default()
            })
            .retry_policy(fast_retry(3))
            .throttle(ThrottleSettings {
                ui_interval: Duration::from_millis(0),
                notification_step: 10,
            })
            .progress_sink(self.progress.clone())
            .notification_sink(self.notifier.clone())
    }
}
