//! The download orchestrator.

use super::config::OrchestratorConfig;
use crate::catalog::Catalog;
use crate::crypto::{ContainerCodec, KeyProvider};
use crate::download::status::ENCRYPTING_PERCENT;
use crate::download::item::file_stem;
use crate::download::{DownloadItem, DownloadProgress, DownloadRecord, Quality, Status};
use crate::error::{Error, Result};
use crate::fetch::{self, download_segmented, download_sequential, FetchContext};
use crate::http::{create_http_client, probe};
use crate::progress::{ProgressEvent, ProgressTracker};
use crate::resolver::StreamResolver;
use crate::sink::{NotificationSink, ProgressSink};

use parking_lot::Mutex;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Extension of stored containers.
const CONTAINER_EXTENSION: &str = "enc";
/// Extension of decrypted playback files.
const PLAYBACK_EXTENSION: &str = "audio";

/// State of one in-flight download.
struct LiveDownload {
    progress: DownloadProgress,
    cancel: CancellationToken,
    generation: u64,
}

struct Inner {
    config: OrchestratorConfig,
    client: ClientWithMiddleware,
    resolver: Arc<dyn StreamResolver>,
    catalog: Arc<dyn Catalog>,
    codec: ContainerCodec,
    progress: Arc<dyn ProgressSink>,
    notifications: Arc<dyn NotificationSink>,
    live: Mutex<HashMap<String, LiveDownload>>,
    generation: AtomicU64,
    /// One lock per item whose playback file is being prepared.
    playback_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Takes items offline and serves them back for playback.
///
/// At most one download per item id is in flight at a time; a second
/// request for the same id is rejected with [`Error::AlreadyDownloading`].
/// Downloads of different items share nothing but the HTTP client.
///
/// An orchestrator is created through its
/// [`OrchestratorBuilder`](super::OrchestratorBuilder) and is cheap to
/// clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .field("active", &self.inner.live.lock().len())
            .finish()
    }
}

/// Holds an item's slot in the live map for the duration of a download.
struct Registration {
    inner: Arc<Inner>,
    item_id: String,
    generation: u64,
    cancel: CancellationToken,
}

impl Registration {
    /// Run `fut` unless the download is cancelled first.
    async fn until_cancelled<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = fut => result,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut live = self.inner.live.lock();
        if live
            .get(&self.item_id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            live.remove(&self.item_id);
        }
    }
}

impl Orchestrator {
    pub(crate) fn new(
        config: OrchestratorConfig,
        resolver: Arc<dyn StreamResolver>,
        catalog: Arc<dyn Catalog>,
        keys: Arc<dyn KeyProvider>,
        progress: Arc<dyn ProgressSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let client = create_http_client(config.http.clone())?;
        let codec = ContainerCodec::new(keys).with_chunk_size(config.chunk_size);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                resolver,
                catalog,
                codec,
                progress,
                notifications,
                live: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                playback_locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Take `item` offline.
    ///
    /// Returns the existing record right away if the item is already stored.
    /// Otherwise resolves a stream URL, fetches it (segmented when the server
    /// honors ranges and the resource is large enough, sequential otherwise
    /// or as a fallback), encrypts it and records it in the catalog.
    ///
    /// Progress is published to the sinks along the way. Every failure path
    /// removes the plaintext staging file and any partial container.
    #[instrument(skip(self, item), fields(item = %item.id))]
    pub async fn download(&self, item: &DownloadItem, quality: Quality) -> Result<DownloadRecord> {
        if let Some(record) = self.stored_record(&item.id).await? {
            debug!("Already downloaded");
            return Ok(record);
        }

        let registration = self.register(item)?;
        // A download of the same item may have finished in between.
        if let Some(record) = self.stored_record(&item.id).await? {
            return Ok(record);
        }

        self.update(&registration, |p| p);
        self.inner.notifications.started(&item.id, &item.title);

        match self.run(item, quality, &registration).await {
            Ok((record, progress)) => {
                info!("Stored {} bytes at {:?}", record.file_size, record.file_path);
                self.inner
                    .progress
                    .publish(&progress.with_status(Status::Completed).with_percent(100));
                self.inner.notifications.completed(&item.id, &item.title);
                Ok(record)
            }
            Err(Error::Cancelled) => {
                info!("Cancelled");
                Err(Error::Cancelled)
            }
            Err(e) => {
                warn!("Download failed: {}", e);
                self.finish(&registration, |p| p.fail(&e));
                self.inner
                    .notifications
                    .failed(&item.id, &item.title, &e.to_string());
                Err(e)
            }
        }
    }

    /// Spawn [`download`](Self::download) as a task.
    pub fn start(&self, item: DownloadItem, quality: Quality) -> JoinHandle<Result<DownloadRecord>> {
        let this = self.clone();
        tokio::spawn(async move { this.download(&item, quality).await })
    }

    /// Cancel the in-flight download of `item_id`.
    ///
    /// The live entry is removed at once; the download task stops at its next
    /// suspension point and removes its partial files. Returns `false` if
    /// nothing was in flight.
    pub fn cancel(&self, item_id: &str) -> bool {
        let Some(entry) = self.inner.live.lock().remove(item_id) else {
            return false;
        };
        entry.cancel.cancel();
        self.inner
            .progress
            .publish(&entry.progress.with_status(Status::Cancelled));
        self.inner.notifications.cancel(item_id);
        info!("Cancelled download of {}", item_id);
        true
    }

    /// Cancel every in-flight download. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<String> = self.inner.live.lock().keys().cloned().collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// Latest progress of an in-flight download.
    pub fn progress(&self, item_id: &str) -> Option<DownloadProgress> {
        self.inner
            .live
            .lock()
            .get(item_id)
            .map(|entry| entry.progress.clone())
    }

    /// Latest progress of every in-flight download.
    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        let mut active: Vec<_> = self
            .inner
            .live
            .lock()
            .values()
            .map(|entry| entry.progress.clone())
            .collect();
        active.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        active
    }

    /// Return `true` if `item_id` has a stored file.
    ///
    /// A record whose file is gone is deleted.
    pub async fn is_downloaded(&self, item_id: &str) -> Result<bool> {
        Ok(self.stored_record(item_id).await?.is_some())
    }

    /// Path of a plaintext file playback can read.
    ///
    /// Encrypted containers are decrypted once into the playback directory
    /// and reused afterwards. A record whose file is gone is deleted and
    /// [`Error::NotDownloaded`] returned.
    #[instrument(skip(self))]
    pub async fn get_playback_file(&self, item_id: &str) -> Result<PathBuf> {
        let record = self
            .stored_record(item_id)
            .await?
            .ok_or_else(|| Error::NotDownloaded(item_id.to_string()))?;
        if !record.encrypted {
            return Ok(record.file_path);
        }

        let lock = self.playback_lock(item_id);
        let prepared = {
            let _guard = lock.lock().await;
            self.prepare_playback(&record).await
        };
        self.release_playback_lock(item_id, lock);
        prepared
    }

    /// Delete the stored copy of `item_id`, cancelling it if in flight.
    ///
    /// Returns `true` if a record was deleted.
    pub async fn delete_download(&self, item_id: &str) -> Result<bool> {
        self.cancel(item_id);
        fetch::remove_quietly(&self.playback_path(item_id)).await;

        let Some(record) = self.inner.catalog.get(item_id).await? else {
            return Ok(false);
        };
        fetch::remove_quietly(record.path()).await;
        self.inner.catalog.delete(item_id).await
    }

    /// Cancel everything in flight and delete every stored copy.
    pub async fn delete_all(&self) -> Result<()> {
        self.cancel_all();
        for record in self.inner.catalog.list_all().await? {
            fetch::remove_quietly(record.path()).await;
        }
        self.inner.catalog.delete_all().await?;
        self.clear_playback_cache().await?;
        info!("Deleted all downloads");
        Ok(())
    }

    /// Sum of the stored file sizes.
    pub async fn total_size(&self) -> Result<u64> {
        self.inner.catalog.total_size().await
    }

    /// Number of stored items.
    pub async fn count(&self) -> Result<usize> {
        self.inner.catalog.count().await
    }

    /// Every catalog record.
    pub async fn list_downloads(&self) -> Result<Vec<DownloadRecord>> {
        self.inner.catalog.list_all().await
    }

    /// Delete records whose file is gone. Returns how many were deleted.
    pub async fn reconcile(&self) -> Result<usize> {
        let mut removed = 0;
        for record in self.inner.catalog.list_all().await? {
            if !record.file_exists() {
                warn!("Removing orphaned record {}", record.item_id);
                self.inner.catalog.delete(&record.item_id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove every decrypted playback file. Returns how many were removed.
    pub async fn clear_playback_cache(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.inner.config.playback_directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == PLAYBACK_EXTENSION) {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        debug!("Removed {} playback files", removed);
        Ok(removed)
    }

    async fn run(
        &self,
        item: &DownloadItem,
        quality: Quality,
        registration: &Registration,
    ) -> Result<(DownloadRecord, DownloadProgress)> {
        let url = registration
            .until_cancelled(self.resolve(&item.id, quality))
            .await?;

        let plaintext = self.staging_path(item, registration.generation, "part");
        let tracker = Arc::new(self.tracker_for(item, registration));
        let ctx = FetchContext {
            client: self.inner.client.clone(),
            retry: self.inner.config.retry.clone(),
            tracker: tracker.clone(),
            cancel: registration.cancel.clone(),
            buffer_size: self.inner.config.buffer_size,
        };

        self.update(registration, |p| p.with_status(Status::Downloading));
        let fetched = registration
            .until_cancelled(self.fetch(&ctx, &url, &plaintext))
            .await;
        let size = match fetched {
            Ok(size) => size,
            Err(e) => {
                fetch::remove_quietly(&plaintext).await;
                return Err(e);
            }
        };
        let total = tracker.total().max(size);
        self.update(registration, |p| {
            p.with_bytes(size, total).with_percent(ENCRYPTING_PERCENT)
        });

        let container = self.staging_path(item, registration.generation, CONTAINER_EXTENSION);
        let encrypted = self
            .inner
            .codec
            .encrypt_file(plaintext.clone(), container.clone())
            .await;
        fetch::remove_quietly(&plaintext).await;
        encrypted?;

        if registration.cancel.is_cancelled() {
            fetch::remove_quietly(&container).await;
            return Err(Error::Cancelled);
        }

        let destination = self.container_path(item);
        if let Err(e) = fs::rename(&container, &destination).await {
            fetch::remove_quietly(&container).await;
            return Err(e.into());
        }

        let stored = async {
            let file_size = fs::metadata(&destination).await?.len();
            let record = DownloadRecord::encrypted(
                item.id.clone(),
                item.title.clone(),
                destination.clone(),
                file_size,
                quality,
            );
            self.inner.catalog.insert(record.clone()).await?;
            Ok::<_, Error>(record)
        }
        .await;
        let record = match stored {
            Ok(record) => record,
            Err(e) => {
                fetch::remove_quietly(&destination).await;
                return Err(e);
            }
        };

        // A cancel that raced the insert wins: the item must not stay stored.
        let Some(progress) = self.claim(registration) else {
            warn!("Cancelled while recording, rolling back");
            self.inner.catalog.delete(&item.id).await?;
            fetch::remove_quietly(&destination).await;
            return Err(Error::Cancelled);
        };
        Ok((record, progress))
    }

    /// Decrypt the container of `record` into the playback directory unless
    /// a decrypted copy already exists.
    async fn prepare_playback(&self, record: &DownloadRecord) -> Result<PathBuf> {
        let playback = self.playback_path(&record.item_id);
        if fs::metadata(&playback).await.is_ok() {
            debug!("Reusing {:?}", playback);
            return Ok(playback);
        }

        fs::create_dir_all(&self.inner.config.playback_directory).await?;
        self.inner
            .codec
            .decrypt_file(record.file_path.clone(), playback.clone())
            .await?;
        debug!("Decrypted {:?} into {:?}", record.file_path, playback);
        Ok(playback)
    }

    fn playback_lock(&self, item_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .playback_locks
            .lock()
            .entry(item_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lock of `item_id` once nobody else waits on it.
    fn release_playback_lock(&self, item_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.inner.playback_locks.lock();
        drop(lock);
        if locks
            .get(item_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(item_id);
        }
    }

    async fn resolve(&self, item_id: &str, quality: Quality) -> Result<Url> {
        self.inner
            .resolver
            .resolve(item_id, quality)
            .await
            .map_err(|e| match e {
                Error::Resolve(_) | Error::Cancelled => e,
                other => Error::Resolve(other.to_string()),
            })
    }

    /// Probe, then fetch segmented or sequentially, falling back to
    /// sequential when the segmented attempt fails.
    async fn fetch(&self, ctx: &FetchContext, url: &Url, destination: &Path) -> Result<u64> {
        let settings = &self.inner.config.segments;
        let probe = probe(&ctx.client, url).await;

        match probe.total_bytes {
            Some(total) if probe.allows_segments(settings.parallel_threshold) => {
                match download_segmented(ctx, url, destination, total, settings).await {
                    Ok(size) => return Ok(size),
                    Err(_) if ctx.cancel.is_cancelled() => return Err(Error::Cancelled),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        warn!("Segmented download failed, falling back to a single stream: {}", e);
                        ctx.tracker.reset();
                    }
                }
            }
            _ => debug!(
                "Fetching sequentially (ranges: {}, size: {:?})",
                probe.supports_ranges, probe.total_bytes
            ),
        }

        if let Some(total) = probe.total_bytes {
            ctx.tracker.set_total(total);
        }
        download_sequential(ctx, url, destination).await
    }

    fn register(&self, item: &DownloadItem) -> Result<Registration> {
        let mut live = self.inner.live.lock();
        if live.contains_key(&item.id) {
            return Err(Error::AlreadyDownloading(item.id.clone()));
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        live.insert(
            item.id.clone(),
            LiveDownload {
                progress: DownloadProgress::pending(item),
                cancel: cancel.clone(),
                generation,
            },
        );
        Ok(Registration {
            inner: self.inner.clone(),
            item_id: item.id.clone(),
            generation,
            cancel,
        })
    }

    /// Apply `f` to the live snapshot and publish the result.
    ///
    /// Does nothing once the entry is gone or belongs to a newer download.
    fn update<F>(&self, registration: &Registration, f: F)
    where
        F: FnOnce(DownloadProgress) -> DownloadProgress,
    {
        let mut live = self.inner.live.lock();
        if let Some(entry) = live
            .get_mut(&registration.item_id)
            .filter(|entry| entry.generation == registration.generation)
        {
            entry.progress = f(entry.progress.clone());
            self.inner.progress.publish(&entry.progress);
        }
    }

    /// Remove the live entry of a download that is about to complete.
    ///
    /// Returns `None` if the download was cancelled in the meantime. Once
    /// claimed, [`cancel`](Self::cancel) no longer sees the download.
    fn claim(&self, registration: &Registration) -> Option<DownloadProgress> {
        let mut live = self.inner.live.lock();
        if !live
            .get(&registration.item_id)
            .is_some_and(|entry| entry.generation == registration.generation)
        {
            return None;
        }
        live.remove(&registration.item_id).map(|entry| entry.progress)
    }

    /// Publish a terminal snapshot and drop the live entry.
    fn finish<F>(&self, registration: &Registration, f: F)
    where
        F: FnOnce(DownloadProgress) -> DownloadProgress,
    {
        let mut live = self.inner.live.lock();
        if live
            .get(&registration.item_id)
            .is_some_and(|entry| entry.generation == registration.generation)
        {
            if let Some(entry) = live.remove(&registration.item_id) {
                self.inner.progress.publish(&f(entry.progress));
            }
        }
    }

    fn tracker_for(&self, item: &DownloadItem, registration: &Registration) -> ProgressTracker {
        let inner = Arc::downgrade(&self.inner);
        let item_id = item.id.clone();
        let title = item.title.clone();
        let generation = registration.generation;

        ProgressTracker::new(
            0,
            self.inner.config.throttle.clone(),
            Arc::new(move |event| {
                let Some(inner) = inner.upgrade() else { return };
                match event {
                    ProgressEvent::Ui {
                        downloaded,
                        total,
                        percent,
                    } => {
                        let mut live = inner.live.lock();
                        if let Some(entry) = live
                            .get_mut(&item_id)
                            .filter(|entry| entry.generation == generation)
                        {
                            entry.progress = entry
                                .progress
                                .clone()
                                .with_status(Status::Downloading)
                                .with_bytes(downloaded, total)
                                .with_percent(percent);
                            inner.progress.publish(&entry.progress);
                        }
                    }
                    ProgressEvent::Notification { percent } => {
                        inner.notifications.progress(&item_id, &title, percent)
                    }
                }
            }),
        )
    }

    /// Look up a record, deleting it if its file is gone.
    async fn stored_record(&self, item_id: &str) -> Result<Option<DownloadRecord>> {
        let Some(record) = self.inner.catalog.get(item_id).await? else {
            return Ok(None);
        };
        if record.file_exists() {
            return Ok(Some(record));
        }

        warn!(
            "Record for {} points to missing file {:?}, removing it",
            item_id, record.file_path
        );
        self.inner.catalog.delete(item_id).await?;
        fetch::remove_quietly(&self.playback_path(item_id)).await;
        Ok(None)
    }

    fn staging_path(&self, item: &DownloadItem, generation: u64, extension: &str) -> PathBuf {
        self.inner.config.staging_directory().join(format!(
            "{}.{}.{}",
            item.file_stem(),
            generation,
            extension
        ))
    }

    fn container_path(&self, item: &DownloadItem) -> PathBuf {
        self.inner
            .config
            .directory
            .join(format!("{}.{}", item.file_stem(), CONTAINER_EXTENSION))
    }

    fn playback_path(&self, item_id: &str) -> PathBuf {
        self.inner
            .config
            .playback_directory
            .join(format!("{}.{}", file_stem(item_id), PLAYBACK_EXTENSION))
    }
}
