//! Error handling for the hoard library.
//!
//! This module provides centralized error handling for every stage of an
//! offline download: stream URL resolution, transport, range contract checks,
//! the encrypted container codec and the catalog. The variants are grouped so
//! callers can tell a corrupted file apart from a network failure.

use reqwest::StatusCode;
use std::io;
use thiserror::Error;

/// Errors that can happen when using hoard.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from an underlying system.
    ///
    /// This variant captures internal errors that don't fit into other categories,
    /// such as a worker task that panicked.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error from the underlying URL parser or the expected URL format.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// I/O Error.
    ///
    /// This variant wraps standard I/O errors that can occur during file operations,
    /// such as creating, writing, or reading files during the download process.
    #[error("I/O error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    /// Error from the Reqwest library.
    #[error("Reqwest error: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },

    /// Error raised by a client middleware.
    #[error("Middleware error: {source}")]
    Middleware {
        #[from]
        source: reqwest_middleware::Error,
    },

    /// The server answered with an error status.
    #[error("Unexpected HTTP status {status} from {url}")]
    Http { status: StatusCode, url: String },

    /// The host name of the resource could not be resolved.
    #[error("Could not resolve host: {0}")]
    Dns(String),

    /// A ranged request was answered with something other than 206.
    #[error("Range {range} was not honored, server answered {status}")]
    RangeNotHonored { status: StatusCode, range: String },

    /// A segment or stream ended with a different byte count than expected.
    #[error("Expected {expected} bytes but received {received}")]
    LengthMismatch { expected: u64, received: u64 },

    /// The stream URL resolver failed to produce a URL.
    #[error("Could not resolve stream URL: {0}")]
    Resolve(String),

    /// The encrypted container is too short to contain a nonce.
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// The authentication tag of an encrypted container did not verify.
    #[error("Authentication failed: the file is corrupted or was tampered with")]
    Authentication,

    /// The cipher could not be initialized or failed mid-stream.
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// The key provider could not produce a cipher handle.
    #[error("Key provider error: {0}")]
    KeyProvider(String),

    /// The catalog store failed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// The item has no usable offline copy.
    #[error("Item {0} is not downloaded")]
    NotDownloaded(String),

    /// A download for the same item is already in flight.
    #[error("Item {0} is already being downloaded")]
    AlreadyDownloading(String),

    /// The download was cancelled.
    #[error("Download cancelled")]
    Cancelled,
}

impl Error {
    /// Convert a transport error, singling out host resolution failures.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if is_dns_failure(&err) {
            let host = err
                .url()
                .and_then(|u| u.host_str())
                .unwrap_or("<unknown>")
                .to_string();
            return Error::Dns(host);
        }
        Error::Reqwest { source: err }
    }

    /// Convert a middleware error, unwrapping the inner reqwest error if any.
    pub(crate) fn from_middleware(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => Error::from_transport(e),
            other => Error::Middleware { source: other },
        }
    }

    /// Return `true` if the error is a failed authentication tag check.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Error::Authentication)
    }

    /// Return `true` if the item has no offline copy.
    pub fn is_not_downloaded(&self) -> bool {
        matches!(self, Error::NotDownloaded(_))
    }

    /// Return `true` if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Walk the source chain looking for the resolver failure hyper reports.
pub(crate) fn is_dns_failure(err: &reqwest::Error) -> bool {
    if !err.is_connect() {
        return false;
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let msg = e.to_string().to_ascii_lowercase();
        if msg.contains("dns error") || msg.contains("failed to lookup address") {
            return true;
        }
        source = e.source();
    }
    false
}

/// Result type alias for operations that can fail with a hoard error.
pub type Result<T> = std::result::Result<T, Error>;
