//! Single request download.

use super::{check_error_status, copy_body, remove_quietly, FetchContext};
use crate::error::{Error, Result};

use reqwest::header::ACCEPT_ENCODING;
use reqwest::Url;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::BufWriter;
use tracing::{debug, instrument};

/// Download `url` into `destination` with one GET request.
///
/// Each retry starts over from byte 0 and takes back the bytes the failed
/// attempt had counted. On failure `destination` is removed. Returns the
/// number of bytes written.
#[instrument(skip(ctx, url), fields(url = %url))]
pub async fn download_sequential(ctx: &FetchContext, url: &Url, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let result = ctx.retry.execute(|| attempt(ctx, url, destination)).await;
    match result {
        Ok(size) => {
            debug!("Sequential download of {} bytes complete", size);
            Ok(size)
        }
        Err(e) => {
            remove_quietly(destination).await;
            Err(e)
        }
    }
}

async fn attempt(ctx: &FetchContext, url: &Url, destination: &Path) -> Result<u64> {
    ctx.check_cancelled()?;

    let response = ctx
        .client
        .get(url.clone())
        .header(ACCEPT_ENCODING, "identity")
        .send()
        .await
        .map_err(Error::from_middleware)?;
    check_error_status(&response)?;

    let expected = response.content_length();
    if let Some(total) = expected {
        if ctx.tracker.total() == 0 {
            ctx.tracker.set_total(total);
        }
    }

    let file = File::create(destination).await?;
    let mut writer = BufWriter::with_capacity(ctx.buffer_size, file);
    let mut received = 0;
    let copied = copy_body(ctx, response, &mut writer, &mut received, expected).await;

    let result = copied.and_then(|()| match expected {
        Some(expected) if expected != received => Err(Error::LengthMismatch { expected, received }),
        _ => Ok(received),
    });
    if result.is_err() {
        ctx.tracker.rollback(received);
    }
    result
}
