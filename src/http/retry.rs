//! Retry policy for transport operations.
//!
//! [`RetryPolicy`] is a pure decision maker: [`classify`] sorts an error into
//! [`Retryable::Transient`] or [`Retryable::Fatal`], and
//! [`RetryPolicy::backoff_delay`] maps an attempt index to a delay with no
//! jitter or hidden state. [`RetryPolicy::execute`] combines both around any
//! fallible async operation.
//!
//! | Error                                   | Decision    |
//! |-----------------------------------------|-------------|
//! | HTTP 408, 429, 5xx                      | transient   |
//! | transport timeout, connection reset     | transient   |
//! | other connect failures                  | transient   |
//! | DNS resolution failure                  | fatal       |
//! | other HTTP 4xx, decode errors           | fatal       |
//! | range contract violations, cancellation | fatal       |
//!
//! The policy also implements [`RetryableStrategy`] so the same rules can
//! drive `reqwest_retry`'s middleware.
//!
//! # Examples
//!
//! ```rust
//! use hoard::http::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(4, Duration::from_millis(100), Duration::from_secs(1));
//! assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
//! assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
//! assert_eq!(policy.backoff_delay(10), Duration::from_secs(1));
//! ```

use crate::error::{Error, Result};

use reqwest::StatusCode;
use reqwest_retry::{Retryable, RetryableStrategy};
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt-indexed exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Create a new [`RetryPolicy`].
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Classify an error. See [`classify`].
    pub fn classify(&self, error: &Error) -> Retryable {
        classify(error)
    }

    /// Delay to wait after the failed attempt with index `attempt` (0-based).
    ///
    /// Doubles from [`base_delay`](Self::base_delay), capped at
    /// [`max_delay`](Self::max_delay).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails fatally or runs out of attempts.
    ///
    /// The last error is returned unchanged.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            if matches!(self.classify(&err), Retryable::Fatal) {
                debug!("Fatal error on attempt {}: {}", attempt, err);
                return Err(err);
            }
            if attempt >= attempts {
                debug!("Giving up after {} attempts: {}", attempt, err);
                return Err(err);
            }

            let delay = self.backoff_delay(attempt - 1);
            warn!(
                "Attempt {}/{} failed: {}. Retrying in {:?}",
                attempt, attempts, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl RetryableStrategy for RetryPolicy {
    fn handle(
        &self,
        res: &std::result::Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) => {
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    Some(classify_status(status))
                } else {
                    None
                }
            }
            Err(reqwest_middleware::Error::Reqwest(e)) => Some(classify_transport(e)),
            Err(_) => Some(Retryable::Fatal),
        }
    }
}

/// Classify an error as transient or fatal.
pub fn classify(error: &Error) -> Retryable {
    match error {
        Error::Http { status, .. } => classify_status(*status),
        Error::Reqwest { source } => classify_transport(source),
        Error::Middleware { source } => match source {
            reqwest_middleware::Error::Reqwest(e) => classify_transport(e),
            _ => Retryable::Fatal,
        },
        Error::IOError { source } => classify_io(source.kind()),
        _ => Retryable::Fatal,
    }
}

/// Classify an HTTP error status.
pub fn classify_status(status: StatusCode) -> Retryable {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        Retryable::Transient
    } else {
        Retryable::Fatal
    }
}

/// Classify a reqwest transport error.
pub fn classify_transport(error: &reqwest::Error) -> Retryable {
    if error.is_timeout() {
        return Retryable::Transient;
    }
    if crate::error::is_dns_failure(error) {
        return Retryable::Fatal;
    }
    if let Some(kind) = io_kind(error) {
        if matches!(classify_io(kind), Retryable::Transient) {
            return Retryable::Transient;
        }
    }
    if let Some(status) = error.status() {
        return classify_status(status);
    }
    if error.is_connect() || error.is_body() {
        return Retryable::Transient;
    }
    Retryable::Fatal
}

fn classify_io(kind: io::ErrorKind) -> Retryable {
    match kind {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::TimedOut
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Interrupted => Retryable::Transient,
        _ => Retryable::Fatal,
    }
}

/// Find the first `io::Error` in the source chain.
fn io_kind(error: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = std::error::Error::source(error);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = e.source();
    }
    None
}
