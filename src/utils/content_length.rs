//! Content length and range header utilities.
//!
//! This module provides helpers for reading the `Content-Range` and
//! `Content-Length` headers of probe and segment responses.

use reqwest::header::CONTENT_RANGE;
use reqwest::Response;

/// A parsed `Content-Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte of the range, when one is given.
    pub start: Option<u64>,
    /// Last byte of the range, inclusive.
    pub end: Option<u64>,
    /// Full size of the resource, `None` for `*`.
    pub total: Option<u64>,
}

/// Parse a `Content-Range` value that uses the `bytes` unit.
///
/// Both `bytes 0-0/1234` and `bytes */1234` are accepted. Any other unit, or
/// a value without a `/`, yields `None`.
///
/// # Example
///
/// ```rust
/// use hoard::utils::parse_content_range;
///
/// let range = parse_content_range("bytes 0-1023/2048").unwrap();
/// assert_eq!(range.start, Some(0));
/// assert_eq!(range.end, Some(1023));
/// assert_eq!(range.total, Some(2048));
/// assert!(parse_content_range("items 0-1/2").is_none());
/// ```
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let rest = value
        .get(..5)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes"))
        .map(|_| &value[5..])?;
    if !rest.starts_with(' ') {
        return None;
    }
    let (span, total) = rest.trim().split_once('/')?;
    let total = total.trim().parse::<u64>().ok();
    let (start, end) = match span.trim() {
        "*" => (None, None),
        span => {
            let (s, e) = span.split_once('-')?;
            (s.trim().parse::<u64>().ok(), e.trim().parse::<u64>().ok())
        }
    };
    Some(ContentRange { start, end, total })
}

/// Parse Content-Range header to extract total size.
///
/// # Example
///
/// ```rust
/// use hoard::utils::parse_content_range_total;
///
/// let total = parse_content_range_total("bytes 0-1023/2048");
/// assert_eq!(total, Some(2048));
/// ```
pub fn parse_content_range_total(content_range: &str) -> Option<u64> {
    content_range
        .split('/')
        .next_back()
        .and_then(|size| size.trim().parse::<u64>().ok())
}

/// Read the `Content-Range` header of a response as a byte range.
pub fn content_range(response: &Response) -> Option<ContentRange> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range)
}

/// Extract content length from Content-Length header with fallback.
pub fn extract_content_length(response: &Response, fallback: Option<u64>) -> Option<u64> {
    response.content_length().or(fallback)
}

/// Format a `Range` request header value for an inclusive byte range.
pub fn range_header(start: u64, end: u64) -> String {
    format!("bytes={}-{}", start, end)
}
