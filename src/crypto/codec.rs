//! Encrypted container codec.
//!
//! Container layout, with no header and no version byte:
//!
//! ```text
//! nonce (12 bytes) || ciphertext (same length as plaintext) || tag (16 bytes)
//! ```
//!
//! Both directions stream in fixed-size chunks and write into a sibling
//! `*.partial` file that is renamed into place only once the operation has
//! fully succeeded. On failure the partial file is removed, so no corrupt or
//! unauthenticated plaintext is ever left where playback could find it.

use super::cipher::{NONCE_LEN, TAG_LEN};
use super::key::KeyProvider;
use crate::error::{Error, Result};

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default size of the chunks pushed through the cipher.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Bytes a container adds on top of its plaintext.
pub const CONTAINER_OVERHEAD: u64 = (NONCE_LEN + TAG_LEN) as u64;

/// Encrypts and decrypts files in the offline container format.
#[derive(Clone)]
pub struct ContainerCodec {
    keys: Arc<dyn KeyProvider>,
    chunk_size: usize,
}

impl fmt::Debug for ContainerCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerCodec")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl ContainerCodec {
    /// Create a codec using handles from `keys`.
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            keys,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the chunk size used for streaming.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Encrypt `source` into a container at `destination`.
    ///
    /// Returns the size of the container on disk.
    pub fn encrypt(&self, source: &Path, destination: &Path) -> Result<u64> {
        with_partial(destination, |partial| self.encrypt_into(source, partial))
    }

    /// Decrypt the container at `source` into `destination`.
    ///
    /// Returns the size of the recovered plaintext. A tag mismatch is reported
    /// as [`Error::Authentication`], a container shorter than its nonce as
    /// [`Error::CorruptContainer`].
    pub fn decrypt(&self, source: &Path, destination: &Path) -> Result<u64> {
        with_partial(destination, |partial| self.decrypt_into(source, partial))
    }

    /// [`encrypt`](Self::encrypt) on the blocking thread pool.
    pub async fn encrypt_file(&self, source: PathBuf, destination: PathBuf) -> Result<u64> {
        let codec = self.clone();
        tokio::task::spawn_blocking(move || codec.encrypt(&source, &destination))
            .await
            .map_err(|e| Error::Internal(format!("encryption task failed: {}", e)))?
    }

    /// [`decrypt`](Self::decrypt) on the blocking thread pool.
    pub async fn decrypt_file(&self, source: PathBuf, destination: PathBuf) -> Result<u64> {
        let codec = self.clone();
        tokio::task::spawn_blocking(move || codec.decrypt(&source, &destination))
            .await
            .map_err(|e| Error::Internal(format!("decryption task failed: {}", e)))?
    }

    fn encrypt_into(&self, source: &Path, partial: &Path) -> Result<u64> {
        let mut encryptor = self.keys.cipher_handle()?.encryptor()?;
        let mut reader = BufReader::new(File::open(source)?);
        let mut writer = BufWriter::new(File::create(partial)?);

        writer.write_all(encryptor.nonce())?;
        let mut written = NONCE_LEN as u64;

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = read_chunk(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            let ciphertext = encryptor.update(&buf[..n]);
            writer.write_all(&ciphertext)?;
            written += ciphertext.len() as u64;
        }

        writer.write_all(&encryptor.finalize())?;
        written += TAG_LEN as u64;

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        debug!("Encrypted {:?} into {} bytes", source, written);
        Ok(written)
    }

    fn decrypt_into(&self, source: &Path, partial: &Path) -> Result<u64> {
        let mut reader = BufReader::new(File::open(source)?);

        let mut nonce = [0u8; NONCE_LEN];
        reader.read_exact(&mut nonce).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                Error::CorruptContainer(format!("{:?} is shorter than its nonce", source))
            }
            _ => Error::from(e),
        })?;

        let mut decryptor = self.keys.cipher_handle()?.decryptor(&nonce);
        let mut writer = BufWriter::new(File::create(partial)?);
        let mut written = 0u64;

        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = read_chunk(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            let plaintext = decryptor.update(&buf[..n]);
            writer.write_all(&plaintext)?;
            written += plaintext.len() as u64;
        }

        decryptor.finalize()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        debug!("Decrypted {:?} into {} bytes", source, written);
        Ok(written)
    }
}

/// Run `op` against a sibling partial file, then rename it into place.
fn with_partial<F>(destination: &Path, op: F) -> Result<u64>
where
    F: FnOnce(&Path) -> Result<u64>,
{
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(destination);
    let result = op(&partial).and_then(|n| {
        fs::rename(&partial, destination)?;
        Ok(n)
    });
    if result.is_err() {
        remove_quietly(&partial);
        remove_quietly(destination);
    }
    result
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {:?}: {}", path, e);
        }
    }
}

/// Fill `buf` as far as possible; short reads only happen at end of input.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SoftwareKeyProvider;

    fn codec() -> ContainerCodec {
        ContainerCodec::new(Arc::new(SoftwareKeyProvider::ephemeral())).with_chunk_size(100)
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/a/track.enc")),
            PathBuf::from("/tmp/a/track.enc.partial")
        );
    }

    #[test]
    fn test_container_size() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain");
        let sealed = dir.path().join("sealed");
        fs::write(&plain, vec![1u8; 1234]).unwrap();

        let size = codec().encrypt(&plain, &sealed).unwrap();
        assert_eq!(size, 1234 + CONTAINER_OVERHEAD);
        assert_eq!(fs::metadata(&sealed).unwrap().len(), size);
        assert!(!partial_path(&sealed).exists());
    }

    #[test]
    fn test_missing_source_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sealed = dir.path().join("sealed");
        let err = codec()
            .encrypt(&dir.path().join("missing"), &sealed)
            .unwrap_err();
        assert!(matches!(err, Error::IOError { .. }));
        assert!(!sealed.exists());
        assert!(!partial_path(&sealed).exists());
    }
}
