//! Segmented parallel download.
//!
//! The destination is pre-sized to the full length, then one task per
//! [`ByteSegment`] issues a ranged GET for exactly its bytes and writes them
//! through its own file handle starting at the segment offset. Workers never
//! share a write cursor and their offsets never overlap.
//!
//! The range contract is strict: a segment answered with anything other than
//! `206` for the requested range, or ending short, fails. Any failing worker
//! fails the whole attempt; the remaining workers are aborted and the
//! destination is removed so the caller can fall back to a sequential
//! download.

use super::segment::{plan_segments, ByteSegment, SegmentSettings};
use super::{check_error_status, copy_body, remove_quietly, FetchContext};
use crate::error::{Error, Result};
use crate::utils::content_length::content_range;

use reqwest::header::{ACCEPT_ENCODING, RANGE};
use reqwest::{StatusCode, Url};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncSeekExt, BufWriter};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// Download `total` bytes of `url` into `destination` with concurrent
/// ranged requests.
///
/// Returns the number of bytes written, always `total` on success.
#[instrument(skip(ctx, url, settings), fields(url = %url))]
pub async fn download_segmented(
    ctx: &FetchContext,
    url: &Url,
    destination: &Path,
    total: u64,
    settings: &SegmentSettings,
) -> Result<u64> {
    if total == 0 {
        return Err(Error::Internal(
            "a segmented download needs a known, non-zero size".into(),
        ));
    }

    let result = run_workers(ctx, url, destination, total, settings).await;
    if let Err(e) = &result {
        warn!("Segmented download failed: {}", e);
        remove_quietly(destination).await;
    }
    result
}

async fn run_workers(
    ctx: &FetchContext,
    url: &Url,
    destination: &Path,
    total: u64,
    settings: &SegmentSettings,
) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let segments = plan_segments(total, settings);
    debug!("Fetching {} bytes in {} segments", total, segments.len());
    ctx.tracker.set_total(total);

    let file = fs::File::create(destination).await?;
    file.set_len(total).await?;
    drop(file);

    let mut workers = JoinSet::new();
    for segment in segments {
        let ctx = ctx.clone();
        let url = url.clone();
        let path = destination.to_path_buf();
        workers.spawn(async move { fetch_segment(ctx, url, path, segment).await });
    }

    while let Some(joined) = workers.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::Internal(format!("segment worker failed: {}", e))),
        };
        if let Err(e) = outcome {
            workers.abort_all();
            while workers.join_next().await.is_some() {}
            return Err(e);
        }
    }

    Ok(total)
}

async fn fetch_segment(
    ctx: FetchContext,
    url: Url,
    path: PathBuf,
    segment: ByteSegment,
) -> Result<()> {
    let written = ctx
        .retry
        .execute(|| attempt(&ctx, &url, &path, segment))
        .await?;
    debug!(
        "Segment {} ({}) complete, {} bytes",
        segment.index,
        segment.range_header(),
        written
    );
    Ok(())
}

async fn attempt(ctx: &FetchContext, url: &Url, path: &Path, segment: ByteSegment) -> Result<u64> {
    ctx.check_cancelled()?;

    let range = segment.range_header();
    let response = ctx
        .client
        .get(url.clone())
        .header(RANGE, &range)
        .header(ACCEPT_ENCODING, "identity")
        .send()
        .await
        .map_err(Error::from_middleware)?;
    check_error_status(&response)?;

    let status = response.status();
    if status != StatusCode::PARTIAL_CONTENT {
        return Err(Error::RangeNotHonored { status, range });
    }
    if let Some(served) = content_range(&response) {
        if served.start != Some(segment.start) || served.end != Some(segment.end) {
            return Err(Error::RangeNotHonored { status, range });
        }
    }

    let mut file = OpenOptions::new().write(true).open(path).await?;
    file.seek(SeekFrom::Start(segment.start)).await?;
    let mut writer = BufWriter::with_capacity(ctx.buffer_size, file);

    let expected = segment.len();
    let mut received = 0;
    let copied = copy_body(ctx, response, &mut writer, &mut received, Some(expected)).await;

    let result = copied.and_then(|()| match received == expected {
        true => Ok(received),
        false => Err(Error::LengthMismatch { expected, received }),
    });
    if result.is_err() {
        ctx.tracker.rollback(received);
    }
    result
}
