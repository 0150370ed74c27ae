//! Network fetch paths.
//!
//! Two ways of bringing a resource to disk share one [`FetchContext`]:
//!
//! - [`download_segmented`] splits a range capable resource into
//!   [`ByteSegment`]s fetched concurrently into a pre-sized file.
//! - [`download_sequential`] streams the whole body through a single request.
//!
//! Both count bytes into the same [`ProgressTracker`], retry transient
//! failures through the [`RetryPolicy`], stop when the cancellation token
//! fires, and remove their destination file when they fail.

pub mod parallel;
pub mod segment;
pub mod sequential;

pub use parallel::download_segmented;
pub use segment::{plan_segments, ByteSegment, SegmentSettings};
pub use sequential::download_sequential;

use crate::error::{Error, Result};
use crate::http::RetryPolicy;
use crate::progress::ProgressTracker;

use futures::StreamExt;
use reqwest::Response;
use reqwest_middleware::ClientWithMiddleware;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Size of the write buffer used by both fetch paths.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Everything a fetch needs besides the URL and destination.
///
/// Cloning is cheap; parallel workers each own a clone.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// HTTP client with tracing middleware.
    pub client: ClientWithMiddleware,
    /// Retry policy for every request.
    pub retry: RetryPolicy,
    /// Shared byte counter.
    pub tracker: Arc<ProgressTracker>,
    /// Fires when the download is cancelled.
    pub cancel: CancellationToken,
    /// Write buffer size.
    pub buffer_size: usize,
}

impl FetchContext {
    /// Create a context with a silent tracker and no cancellation.
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            tracker: Arc::new(ProgressTracker::silent()),
            cancel: CancellationToken::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Return `Err(Cancelled)` once the token fired.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match self.cancel.is_cancelled() {
            true => Err(Error::Cancelled),
            false => Ok(()),
        }
    }
}

/// Fail with [`Error::Http`] on 4xx and 5xx responses.
pub(crate) fn check_error_status(response: &Response) -> Result<()> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Http {
            status,
            url: response.url().to_string(),
        });
    }
    Ok(())
}

/// Stream `response` into `writer`, counting bytes into `received` and the
/// tracker.
///
/// With a `limit`, receiving more bytes than expected stops the copy with
/// [`Error::LengthMismatch`].
pub(crate) async fn copy_body<W>(
    ctx: &FetchContext,
    response: Response,
    writer: &mut W,
    received: &mut u64,
    limit: Option<u64>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = response.bytes_stream();
    loop {
        let item = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
            item = stream.next() => item,
        };
        let Some(item) = item else { break };
        let mut chunk = item.map_err(Error::from_transport)?;
        let chunk_size = chunk.len() as u64;

        if let Some(limit) = limit {
            if *received + chunk_size > limit {
                return Err(Error::LengthMismatch {
                    expected: limit,
                    received: *received + chunk_size,
                });
            }
        }

        writer.write_all_buf(&mut chunk).await?;
        *received += chunk_size;
        ctx.tracker.add(chunk_size);
    }
    writer.flush().await?;
    Ok(())
}

/// Remove a file, ignoring a missing one.
pub(crate) async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!("Could not remove {:?}: {}", path, e),
    }
}
