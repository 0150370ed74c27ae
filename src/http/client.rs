//! HTTP client setup and middleware configuration.
//!
//! This module provides HTTP client creation with tracing middleware, optional
//! middleware level retries, proxy support and default headers. Downloads
//! disable transport-level content encoding so that declared lengths are true
//! byte lengths.
//!
//! # Examples
//!
//! ## Basic Client Creation
//!
//! ```rust
//! use hoard::http::{create_http_client, HttpClientConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::default();
//! let client = create_http_client(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Client with Custom Configuration
//!
//! ```rust
//! use hoard::http::{create_http_client, HttpClientConfig};
//! use reqwest::header::{HeaderMap, USER_AGENT};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut headers = HeaderMap::new();
//! headers.insert(USER_AGENT, "MyPlayer/1.0".parse()?);
//!
//! let config = HttpClientConfig {
//!     headers: Some(headers),
//!     timeout: Some(Duration::from_secs(30)),
//!     ..HttpClientConfig::default()
//! };
//!
//! let client = create_http_client(config)?;
//! # Ok(())
//! # }
//! ```

use super::retry::RetryPolicy;

use reqwest::{header::HeaderMap, Proxy};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;
use std::time::Duration;

/// Configuration for HTTP client setup.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Number of middleware retries for failed requests.
    ///
    /// Downloads already retry through [`RetryPolicy::execute`], so this is
    /// `0` by default.
    pub retries: u32,
    /// Optional proxy configuration.
    pub proxy: Option<Proxy>,
    /// Honor proxies declared in the environment.
    pub system_proxy: bool,
    /// Default headers to include with all requests.
    pub headers: Option<HeaderMap>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retries: 0,
            proxy: None,
            system_proxy: true,
            headers: None,
            timeout: None,
            connect_timeout: Some(Duration::from_secs(15)),
        }
    }
}

/// Creates an HTTP client with middleware configuration.
///
/// This function sets up a reqwest client with:
/// - Tracing middleware for request/response logging
/// - Retry middleware classified by [`RetryPolicy`] when `retries > 0`
/// - Optional proxy support
/// - Optional default headers and timeouts
pub fn create_http_client(
    config: HttpClientConfig,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    let mut inner_client_builder = reqwest::Client::builder();

    if !config.system_proxy {
        inner_client_builder = inner_client_builder.no_proxy();
    }

    if let Some(proxy) = config.proxy {
        inner_client_builder = inner_client_builder.proxy(proxy);
    }

    if let Some(headers) = config.headers {
        inner_client_builder = inner_client_builder.default_headers(headers);
    }

    if let Some(timeout) = config.timeout {
        inner_client_builder = inner_client_builder.timeout(timeout);
    }

    if let Some(timeout) = config.connect_timeout {
        inner_client_builder = inner_client_builder.connect_timeout(timeout);
    }

    let inner_client = inner_client_builder.build()?;

    // Trace HTTP requests. See the tracing crate to make use of these traces.
    let mut builder = ClientBuilder::new(inner_client).with(TracingMiddleware::default());

    if config.retries > 0 {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy_and_strategy(
            retry_policy,
            RetryPolicy::default(),
        ));
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, USER_AGENT};

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.retries, 0);
        assert!(config.proxy.is_none());
        assert!(config.headers.is_none());
        assert!(config.system_proxy);
    }

    #[test]
    fn test_create_http_client_default() {
        let config = HttpClientConfig::default();
        let client = create_http_client(config);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_http_client_with_headers_and_retries() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("test-agent"));

        let config = HttpClientConfig {
            retries: 5,
            headers: Some(headers),
            system_proxy: false,
            ..HttpClientConfig::default()
        };

        let client = create_http_client(config);
        assert!(client.is_ok());
    }
}
