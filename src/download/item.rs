//! Items that can be taken offline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Represents a remote audio item to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadItem {
    /// Unique identifier of the item.
    pub id: String,
    /// Title shown in progress and notifications.
    pub title: String,
}

impl DownloadItem {
    /// Creates a new [`DownloadItem`].
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }

    /// File name stem safe to use on any platform.
    ///
    /// The id is hex encoded, so distinct ids never share a stem.
    pub fn file_stem(&self) -> String {
        file_stem(&self.id)
    }
}

pub(crate) fn file_stem(id: &str) -> String {
    match id.is_empty() {
        true => "_".to_string(),
        false => hex::encode(id),
    }
}

/// Quality tier requested from the stream URL resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Smallest files, for constrained storage.
    Low,
    /// The default tier.
    #[default]
    Normal,
    /// Higher bitrate.
    High,
    /// Lossless audio.
    Lossless,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quality::Low => "low",
            Quality::Normal => "normal",
            Quality::High => "high",
            Quality::Lossless => "lossless",
        };
        f.write_str(s)
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "normal" => Ok(Quality::Normal),
            "high" => Ok(Quality::High),
            "lossless" => Ok(Quality::Lossless),
            other => Err(Error::Internal(format!("unknown quality tier: {}", other))),
        }
    }
}
