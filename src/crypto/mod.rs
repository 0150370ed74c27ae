//! Encryption of offline content.
//!
//! - [`cipher`] - Streaming AES-256-GCM bound to a key handle
//! - [`key`] - Key providers that hand out cipher handles, never key bytes
//! - [`codec`] - The on-disk container format and file level encrypt/decrypt
//!
//! # Examples
//!
//! ```rust,no_run
//! use hoard::crypto::{ContainerCodec, SoftwareKeyProvider};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), hoard::Error> {
//! let codec = ContainerCodec::new(Arc::new(SoftwareKeyProvider::open("content.key")));
//! codec.encrypt(Path::new("track.part"), Path::new("track.enc"))?;
//! codec.decrypt(Path::new("track.enc"), Path::new("track.audio"))?;
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod codec;
pub mod key;

pub use cipher::{CipherHandle, StreamDecryptor, StreamEncryptor, NONCE_LEN, TAG_LEN};
pub use codec::{ContainerCodec, CONTAINER_OVERHEAD};
pub use key::{KeyProvider, SoftwareKeyProvider};
