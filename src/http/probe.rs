//! Range capability probing.
//!
//! A probe asks for the first byte only (`Range: bytes=0-0`) with content
//! encoding disabled. A `206` carrying a `bytes` `Content-Range` means the
//! server honors ranges, and the range's total is the resource size. Probing
//! never fails: transport errors degrade to "no ranges, size unknown".

use crate::utils::content_length::{content_range, extract_content_length, range_header};

use reqwest::header::{ACCEPT_ENCODING, RANGE};
use reqwest::{StatusCode, Url};
use reqwest_middleware::ClientWithMiddleware;
use tracing::debug;

/// Outcome of probing a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeProbe {
    /// The server answered the probe with `206` and a byte `Content-Range`.
    pub supports_ranges: bool,
    /// Size of the resource, when known.
    pub total_bytes: Option<u64>,
}

impl RangeProbe {
    /// The result used when probing fails.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Return `true` if a segmented download of at least `threshold` bytes
    /// can be attempted.
    pub fn allows_segments(&self, threshold: u64) -> bool {
        self.supports_ranges && matches!(self.total_bytes, Some(total) if total > 0 && total >= threshold)
    }
}

/// Probe `url` for range support and total size.
pub async fn probe(client: &ClientWithMiddleware, url: &Url) -> RangeProbe {
    let response = match client
        .get(url.clone())
        .header(RANGE, range_header(0, 0))
        .header(ACCEPT_ENCODING, "identity")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            debug!("Range probe of {} failed: {}", url, e);
            return RangeProbe::unknown();
        }
    };

    let status = response.status();
    let range = content_range(&response);
    let probe = match (status, range) {
        (StatusCode::PARTIAL_CONTENT, Some(range)) => RangeProbe {
            supports_ranges: true,
            total_bytes: range.total,
        },
        (StatusCode::PARTIAL_CONTENT, None) => RangeProbe::unknown(),
        (status, _) if status.is_success() => RangeProbe {
            supports_ranges: false,
            total_bytes: extract_content_length(&response, None),
        },
        _ => RangeProbe::unknown(),
    };

    debug!(
        "Probed {}: status {}, ranges {}, total {:?}",
        url, status, probe.supports_ranges, probe.total_bytes
    );
    probe
}
