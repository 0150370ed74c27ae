//! Configuration structures and defaults for the orchestrator.
//!
//! # Examples
//!
//! ```rust
//! use hoard::orchestrator::OrchestratorConfig;
//! use std::path::PathBuf;
//!
//! let config = OrchestratorConfig {
//!     directory: PathBuf::from("offline"),
//!     ..OrchestratorConfig::default()
//! };
//! assert_eq!(config.segments.max_segments, 4);
//! ```

use crate::crypto::codec::DEFAULT_CHUNK_SIZE;
use crate::fetch::{SegmentSettings, DEFAULT_BUFFER_SIZE};
use crate::http::{HttpClientConfig, RetryPolicy};
use crate::progress::ThrottleSettings;

use std::env::{current_dir, temp_dir};
use std::path::PathBuf;

/// Configuration structure for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory holding the encrypted containers.
    ///
    /// Plaintext staging files live in its `.partial` subdirectory.
    pub directory: PathBuf,
    /// Directory holding decrypted files handed to playback.
    pub playback_directory: PathBuf,
    /// HTTP client setup.
    pub http: HttpClientConfig,
    /// Retry policy for every request.
    pub retry: RetryPolicy,
    /// Segmented download thresholds.
    pub segments: SegmentSettings,
    /// Write buffer size of the fetch paths.
    pub buffer_size: usize,
    /// Plaintext chunk size of the container codec.
    pub chunk_size: usize,
    /// Progress throttles.
    pub throttle: ThrottleSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            directory: current_dir().unwrap_or_default().join("offline"),
            playback_directory: temp_dir().join("hoard-playback"),
            http: HttpClientConfig::default(),
            retry: RetryPolicy::default(),
            segments: SegmentSettings::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            throttle: ThrottleSettings::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Directory holding plaintext staging files.
    pub fn staging_directory(&self) -> PathBuf {
        self.directory.join(".partial")
    }
}
