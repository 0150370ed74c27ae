//! Catalog of downloaded items.
//!
//! The [`Catalog`] trait is the persisted index of which items have an
//! offline copy and where it lives. Callers assume per-call atomicity only.
//!
//! Two implementations are provided:
//!
//! - [`MemoryCatalog`] keeps records for the lifetime of the process.
//! - [`JsonCatalog`] persists every change to a JSON file, replacing it
//!   atomically through a temporary sibling.
//!
//! # Examples
//!
//! ```rust
//! use hoard::catalog::{Catalog, MemoryCatalog};
//! use hoard::download::{DownloadRecord, Quality};
//!
//! # async fn example() -> hoard::Result<()> {
//! let catalog = MemoryCatalog::new();
//! catalog
//!     .insert(DownloadRecord::encrypted("id", "Title", "id.enc".into(), 128, Quality::High))
//!     .await?;
//! assert_eq!(catalog.count().await?, 1);
//! assert_eq!(catalog.total_size().await?, 128);
//! # Ok(())
//! # }
//! ```

use crate::download::DownloadRecord;
use crate::error::{Error, Result};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Persisted index of downloaded items.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up the record for `item_id`.
    async fn get(&self, item_id: &str) -> Result<Option<DownloadRecord>>;

    /// Insert a record, replacing any record with the same item id.
    async fn insert(&self, record: DownloadRecord) -> Result<()>;

    /// Delete the record for `item_id`. Returns `true` if one existed.
    async fn delete(&self, item_id: &str) -> Result<bool>;

    /// Delete every record.
    async fn delete_all(&self) -> Result<()>;

    /// Sum of the recorded file sizes.
    async fn total_size(&self) -> Result<u64>;

    /// Number of records.
    async fn count(&self) -> Result<usize>;

    /// Every record, ordered by item id.
    async fn list_all(&self) -> Result<Vec<DownloadRecord>>;
}

type Records = BTreeMap<String, DownloadRecord>;

fn total_size(records: &Records) -> u64 {
    records.values().map(|r| r.file_size).sum()
}

/// A catalog held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Mutex<Records>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get(&self, item_id: &str) -> Result<Option<DownloadRecord>> {
        Ok(self.records.lock().await.get(item_id).cloned())
    }

    async fn insert(&self, record: DownloadRecord) -> Result<()> {
        self.records
            .lock()
            .await
            .insert(record.item_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, item_id: &str) -> Result<bool> {
        Ok(self.records.lock().await.remove(item_id).is_some())
    }

    async fn delete_all(&self) -> Result<()> {
        self.records.lock().await.clear();
        Ok(())
    }

    async fn total_size(&self) -> Result<u64> {
        Ok(total_size(&*self.records.lock().await))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }

    async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}

/// A catalog persisted as a JSON array of records.
///
/// The whole file is rewritten on every change. Reads are served from
/// memory.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    records: Mutex<Records>,
}

impl JsonCatalog {
    /// Open the catalog stored at `path`, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let list: Vec<DownloadRecord> = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::Catalog(format!("{:?} is not a valid catalog: {}", path, e)))?;
                list.into_iter().map(|r| (r.item_id.clone(), r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Records::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Opened catalog {:?} with {} records", path, records.len());
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    /// Location of the catalog file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &Records) -> Result<()> {
        let list: Vec<&DownloadRecord> = records.values().collect();
        let json = serde_json::to_vec_pretty(&list)
            .map_err(|e| Error::Catalog(format!("cannot serialize catalog: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    async fn get(&self, item_id: &str) -> Result<Option<DownloadRecord>> {
        Ok(self.records.lock().await.get(item_id).cloned())
    }

    async fn insert(&self, record: DownloadRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        let previous = records.insert(record.item_id.clone(), record.clone());
        if let Err(e) = self.persist(&records).await {
            match previous {
                Some(previous) => records.insert(previous.item_id.clone(), previous),
                None => records.remove(&record.item_id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, item_id: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        let Some(removed) = records.remove(item_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&records).await {
            records.insert(removed.item_id.clone(), removed);
            return Err(e);
        }
        Ok(true)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut records = self.records.lock().await;
        self.persist(&Records::new()).await?;
        records.clear();
        Ok(())
    }

    async fn total_size(&self) -> Result<u64> {
        Ok(total_size(&*self.records.lock().await))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().await.len())
    }

    async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::Quality;

    fn record(id: &str, size: u64) -> DownloadRecord {
        DownloadRecord::encrypted(id, id.to_uppercase(), format!("{}.enc", id).into(), size, Quality::Normal)
    }

    #[tokio::test]
    async fn test_memory_catalog() {
        let catalog = MemoryCatalog::new();
        catalog.insert(record("b", 20)).await.unwrap();
        catalog.insert(record("a", 10)).await.unwrap();
        catalog.insert(record("a", 15)).await.unwrap();

        assert_eq!(catalog.count().await.unwrap(), 2);
        assert_eq!(catalog.total_size().await.unwrap(), 35);
        let ids: Vec<_> = catalog
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(catalog.delete("a").await.unwrap());
        assert!(!catalog.delete("a").await.unwrap());
        catalog.delete_all().await.unwrap();
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_json_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let catalog = JsonCatalog::open(&path).await.unwrap();
        catalog.insert(record("a", 10)).await.unwrap();
        catalog.insert(record("b", 20)).await.unwrap();
        catalog.delete("b").await.unwrap();
        drop(catalog);

        let reopened = JsonCatalog::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let a = reopened.get("a").await.unwrap().unwrap();
        assert_eq!(a.title, "A");
        assert_eq!(a.file_size, 10);
        assert!(a.encrypted);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_json_catalog_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            JsonCatalog::open(&path).await,
            Err(Error::Catalog(_))
        ));
    }
}
