//! Key providers.
//!
//! A [`KeyProvider`] hides where the symmetric key lives. Callers only ever
//! receive a [`CipherHandle`]; raw key bytes stay inside the provider.
//! Platform keystores implement the trait themselves. [`SoftwareKeyProvider`]
//! covers hosts without one.

use super::cipher::{CipherHandle, KEY_LEN};
use crate::error::{Error, Result};

use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source of cipher handles bound to the offline content key.
pub trait KeyProvider: Send + Sync {
    /// Return a handle for the content key, generating the key on first use.
    fn cipher_handle(&self) -> Result<CipherHandle>;
}

enum KeySource {
    Memory,
    File(PathBuf),
}

/// A key provider backed by process memory or a key file.
pub struct SoftwareKeyProvider {
    source: KeySource,
    handle: Mutex<Option<CipherHandle>>,
}

impl fmt::Debug for SoftwareKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            KeySource::Memory => "memory".to_string(),
            KeySource::File(p) => p.display().to_string(),
        };
        f.debug_struct("SoftwareKeyProvider")
            .field("source", &source)
            .finish()
    }
}

impl SoftwareKeyProvider {
    /// A provider whose key only lives as long as the process.
    pub fn ephemeral() -> Self {
        Self {
            source: KeySource::Memory,
            handle: Mutex::new(None),
        }
    }

    /// A provider that reads its key from `path`, creating it if missing.
    ///
    /// The file holds the hex-encoded key. Deleting it makes every container
    /// written with it unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            source: KeySource::File(path.into()),
            handle: Mutex::new(None),
        }
    }

    fn load_or_create(&self) -> Result<CipherHandle> {
        match &self.source {
            KeySource::Memory => {
                let key = generate_key()?;
                CipherHandle::new(&key)
            }
            KeySource::File(path) => {
                if path.exists() {
                    debug!("Loading content key from {:?}", path);
                    let text = fs::read_to_string(path)?;
                    let key = hex::decode(text.trim())
                        .map_err(|e| Error::KeyProvider(format!("invalid key file: {}", e)))?;
                    CipherHandle::new(&key)
                } else {
                    info!("Generating new content key at {:?}", path);
                    let key = generate_key()?;
                    write_key_file(path, &key)?;
                    CipherHandle::new(&key)
                }
            }
        }
    }
}

impl KeyProvider for SoftwareKeyProvider {
    fn cipher_handle(&self) -> Result<CipherHandle> {
        let mut slot = self.handle.lock();
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }
        let handle = self.load_or_create()?;
        *slot = Some(handle.clone());
        Ok(handle)
    }
}

fn generate_key() -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    getrandom::getrandom(&mut key)
        .map_err(|e| Error::KeyProvider(format!("key generation failed: {}", e)))?;
    Ok(key)
}

fn write_key_file(path: &Path, key: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, hex::encode(key))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
