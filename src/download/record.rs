//! Catalog records.

use super::item::Quality;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One downloaded item as persisted by the [`Catalog`](crate::catalog::Catalog).
///
/// A record is only valid while its file exists; see
/// [`Orchestrator::reconcile`](crate::Orchestrator::reconcile).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Unique identifier of the item.
    pub item_id: String,
    /// Title shown to the user.
    pub title: String,
    /// Location of the stored file.
    pub file_path: PathBuf,
    /// Size of the stored file in bytes, container overhead included.
    pub file_size: u64,
    /// Quality tier that was requested.
    pub quality: Quality,
    /// Whether the stored file is an encrypted container.
    pub encrypted: bool,
    /// When the download completed.
    pub created_at: DateTime<Utc>,
}

impl DownloadRecord {
    /// Create a record for an encrypted container written just now.
    pub fn encrypted(
        item_id: impl Into<String>,
        title: impl Into<String>,
        file_path: PathBuf,
        file_size: u64,
        quality: Quality,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            file_path,
            file_size,
            quality,
            encrypted: true,
            created_at: Utc::now(),
        }
    }

    /// Location of the stored file.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Return `true` if the stored file is still on disk.
    pub fn file_exists(&self) -> bool {
        self.file_path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serde() {
        let record = DownloadRecord::encrypted(
            "id-1",
            "Song",
            PathBuf::from("/tmp/id-1.enc"),
            128,
            Quality::High,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"quality\":\"high\""));
        let back: DownloadRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back.encrypted);
    }

    #[test]
    fn test_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.enc");
        let record = DownloadRecord::encrypted("a", "A", path.clone(), 0, Quality::Low);
        assert!(!record.file_exists());
        std::fs::write(&path, b"x").unwrap();
        assert!(record.file_exists());
    }
}
