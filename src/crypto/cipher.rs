//! Streaming AES-256-GCM.
//!
//! The one-shot `aes-gcm` API needs the whole message in memory, which does not
//! work for audio files of arbitrary size. This module composes the same
//! primitives (AES-256 block cipher, 32-bit big-endian CTR mode and GHASH) into
//! an incremental encryptor and decryptor that produce and consume the
//! standard GCM layout: ciphertext followed by a 16-byte tag, with a 96-bit
//! nonce and no associated data.
//!
//! A [`CipherHandle`] owns the expanded key and never hands it back out. It is
//! obtained from a [`KeyProvider`](super::KeyProvider).

use crate::error::{Error, Result};

use aes::cipher::{BlockEncrypt, InnerIvInit, KeyInit, StreamCipher};
use aes::Aes256;
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use std::fmt;

/// Size of the GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;
/// Size of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

const BLOCK_LEN: usize = 16;

type Block = aes::Block;
type Ctr = ctr::Ctr32BE<Aes256>;

/// A usable cipher bound to one symmetric key.
#[derive(Clone)]
pub struct CipherHandle {
    cipher: Aes256,
}

impl fmt::Debug for CipherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherHandle")
            .field("cipher", &"[REDACTED]")
            .finish()
    }
}

impl CipherHandle {
    /// Create a handle from key material. The bytes are consumed by the key
    /// schedule and cannot be read back.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(Error::Cipher(format!(
                "invalid key length {}, expected {}",
                key.len(),
                KEY_LEN
            )));
        }
        let cipher = Aes256::new_from_slice(key)
            .map_err(|e| Error::Cipher(format!("invalid key: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Initialize for encryption with a freshly generated random nonce.
    ///
    /// The nonce is never supplied by the caller; read it back with
    /// [`StreamEncryptor::nonce`] to store it alongside the ciphertext.
    pub fn encryptor(&self) -> Result<StreamEncryptor> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce)
            .map_err(|e| Error::Cipher(format!("nonce generation failed: {}", e)))?;
        let core = GcmCore::new(&self.cipher, &nonce);
        Ok(StreamEncryptor { nonce, core })
    }

    /// Initialize for decryption with the nonce read from a container.
    pub fn decryptor(&self, nonce: &[u8; NONCE_LEN]) -> StreamDecryptor {
        StreamDecryptor {
            core: GcmCore::new(&self.cipher, nonce),
            held: Vec::with_capacity(TAG_LEN * 2),
        }
    }
}

/// State shared by both directions: keystream, GHASH and the tag mask.
struct GcmCore {
    ctr: Ctr,
    ghash: GHash,
    /// Partial ciphertext block not yet absorbed by GHASH.
    pending: Vec<u8>,
    ciphertext_len: u64,
    tag_mask: Block,
}

impl GcmCore {
    fn new(cipher: &Aes256, nonce: &[u8; NONCE_LEN]) -> Self {
        // H = E(K, 0^128)
        let mut h = Block::default();
        cipher.encrypt_block(&mut h);
        let ghash = GHash::new(&h);

        // J0 = nonce || 0^31 || 1 masks the tag, data starts at J0 + 1.
        let mut j0 = Block::default();
        j0[..NONCE_LEN].copy_from_slice(nonce);
        j0[BLOCK_LEN - 1] = 1;
        let mut tag_mask = j0.clone();
        cipher.encrypt_block(&mut tag_mask);

        let mut counter = j0;
        counter[BLOCK_LEN - 1] = 2;
        let ctr = Ctr::from_core(ctr::CtrCore::inner_iv_init(cipher.clone(), &counter));

        Self {
            ctr,
            ghash,
            pending: Vec::with_capacity(BLOCK_LEN),
            ciphertext_len: 0,
            tag_mask,
        }
    }

    /// Feed ciphertext into GHASH, keeping any trailing partial block.
    fn absorb(&mut self, mut ciphertext: &[u8]) {
        self.ciphertext_len += ciphertext.len() as u64;

        if !self.pending.is_empty() {
            let take = (BLOCK_LEN - self.pending.len()).min(ciphertext.len());
            self.pending.extend_from_slice(&ciphertext[..take]);
            ciphertext = &ciphertext[take..];
            if self.pending.len() < BLOCK_LEN {
                return;
            }
            let block = Block::clone_from_slice(&self.pending);
            self.ghash.update(&[block]);
            self.pending.clear();
        }

        let full = ciphertext.len() - ciphertext.len() % BLOCK_LEN;
        let blocks: Vec<Block> = ciphertext[..full]
            .chunks_exact(BLOCK_LEN)
            .map(Block::clone_from_slice)
            .collect();
        self.ghash.update(&blocks);
        self.pending.extend_from_slice(&ciphertext[full..]);
    }

    fn tag(mut self) -> [u8; TAG_LEN] {
        if !self.pending.is_empty() {
            self.ghash.update_padded(&self.pending);
        }
        // No associated data, so the length block is 0 || bitlen(C).
        let mut lengths = Block::default();
        lengths[8..].copy_from_slice(&(self.ciphertext_len * 8).to_be_bytes());
        self.ghash.update(&[lengths]);

        let digest = self.ghash.finalize();
        let mut tag = [0u8; TAG_LEN];
        for (i, byte) in tag.iter_mut().enumerate() {
            *byte = digest[i] ^ self.tag_mask[i];
        }
        tag
    }
}

/// Incremental encryptor. Output of every [`update`](Self::update) can be
/// written out immediately.
pub struct StreamEncryptor {
    nonce: [u8; NONCE_LEN],
    core: GcmCore,
}

impl StreamEncryptor {
    /// The nonce chosen for this encryption.
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Encrypt a chunk of plaintext.
    pub fn update(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = plaintext.to_vec();
        self.core.ctr.apply_keystream(&mut out);
        self.core.absorb(&out);
        out
    }

    /// Finish the stream and return the authentication tag.
    pub fn finalize(self) -> [u8; TAG_LEN] {
        self.core.tag()
    }
}

/// Incremental decryptor.
///
/// The last [`TAG_LEN`] bytes of the input are held back until
/// [`finalize`](Self::finalize), which is where the tag is verified. Plaintext
/// returned by `update` is unauthenticated until `finalize` succeeds.
pub struct StreamDecryptor {
    core: GcmCore,
    held: Vec<u8>,
}

impl StreamDecryptor {
    /// Decrypt a chunk of the container body (ciphertext and trailing tag).
    pub fn update(&mut self, input: &[u8]) -> Vec<u8> {
        self.held.extend_from_slice(input);
        if self.held.len() <= TAG_LEN {
            return Vec::new();
        }
        let ready = self.held.len() - TAG_LEN;
        let mut out: Vec<u8> = self.held.drain(..ready).collect();
        self.core.absorb(&out);
        self.core.ctr.apply_keystream(&mut out);
        out
    }

    /// Verify the trailing tag.
    pub fn finalize(self) -> Result<()> {
        if self.held.len() != TAG_LEN {
            return Err(Error::Authentication);
        }
        let expected = self.core.tag();
        let diff = expected
            .iter()
            .zip(self.held.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(Error::Authentication);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> CipherHandle {
        CipherHandle::new(&[7u8; KEY_LEN]).unwrap()
    }

    fn seal(handle: &CipherHandle, plaintext: &[u8], chunk: usize) -> ([u8; NONCE_LEN], Vec<u8>) {
        let mut enc = handle.encryptor().unwrap();
        let nonce = *enc.nonce();
        let mut body = Vec::new();
        for part in plaintext.chunks(chunk.max(1)) {
            body.extend(enc.update(part));
        }
        body.extend_from_slice(&enc.finalize());
        (nonce, body)
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(CipherHandle::new(&[0u8; 16]), Err(Error::Cipher(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", handle());
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_nonces_are_fresh() {
        let h = handle();
        let a = *h.encryptor().unwrap().nonce();
        let b = *h.encryptor().unwrap().nonce();
        assert_ne!(a, b);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let h = handle();
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 31 % 251) as u8).collect();
        let (nonce, body) = seal(&h, &data, 7);

        let mut dec = h.decryptor(&nonce);
        let mut plain = Vec::new();
        for part in body.chunks(33) {
            plain.extend(dec.update(part));
        }
        dec.finalize().unwrap();
        assert_eq!(plain, data);
    }

    #[test]
    fn test_empty_plaintext_has_only_tag() {
        let h = handle();
        let (nonce, body) = seal(&h, &[], 8);
        assert_eq!(body.len(), TAG_LEN);
        let mut dec = h.decryptor(&nonce);
        assert!(dec.update(&body).is_empty());
        dec.finalize().unwrap();
    }

    #[test]
    fn test_truncated_tag_fails() {
        let h = handle();
        let (nonce, body) = seal(&h, b"hello world", 4);
        let mut dec = h.decryptor(&nonce);
        dec.update(&body[..body.len() - 1]);
        assert!(matches!(dec.finalize(), Err(Error::Authentication)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (nonce, body) = seal(&handle(), b"secret audio", 5);
        let other = CipherHandle::new(&[8u8; KEY_LEN]).unwrap();
        let mut dec = other.decryptor(&nonce);
        dec.update(&body);
        assert!(dec.finalize().is_err());
    }
}
