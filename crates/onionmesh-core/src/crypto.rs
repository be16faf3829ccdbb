//! Per-hop authenticated encryption
//!
//! Every onion layer is a ChaCha20-Poly1305 envelope:
//!
//! ```text
//! +-----------+------------------------+-----------+
//! | nonce 12B | ciphertext (len = msg) | tag 16B   |
//! +-----------+------------------------+-----------+
//! ```
//!
//! The nonce is drawn fresh from the OS RNG on every call and travels with
//! the ciphertext, so the hop holding the key can always open its layer.

use crate::error::{Error, Result};
use crate::types::NodeId;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

/// Symmetric key size in bytes
pub const KEY_SIZE: usize = 32;
/// AEAD nonce size in bytes
pub const NONCE_SIZE: usize = 12;
/// Poly1305 tag size in bytes
pub const TAG_SIZE: usize = 16;
/// Bytes added by one layer
pub const ENVELOPE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// HKDF salt for hop key derivation
const DOMAIN_HOP_KEY: &[u8] = b"onionmesh-hop-key-v1";

/// Symmetric key bound to exactly one node.
///
/// Held by that node and resolvable by senders through a key directory.
/// Never serialized onto the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct RouteKey([u8; KEY_SIZE]);

impl RouteKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes (for provisioning and deterministic tests)
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive a node's key from a shared master secret.
    ///
    /// `key = HKDF-SHA256(salt = "onionmesh-hop-key-v1", ikm = master, info = node_id)`
    pub fn derive(master_secret: &[u8], node_id: &NodeId) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(Some(DOMAIN_HOP_KEY), master_secret);
        let mut bytes = [0u8; KEY_SIZE];
        hkdf.expand(node_id.as_str().as_bytes(), &mut bytes)
            .map_err(|_| Error::KeyDerivation)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Short BLAKE3 fingerprint, safe to log
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(&self.0);
        hex::encode(&hash.as_bytes()[..8])
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl fmt::Debug for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteKey({})", self.fingerprint())
    }
}

/// Encrypt one layer under `key` with a fresh random nonce.
///
/// Output is `nonce || ciphertext || tag`, exactly
/// `plaintext.len() + ENVELOPE_OVERHEAD` bytes.
pub fn encrypt(key: &RouteKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| Error::EncryptionFailed)?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Open one layer sealed by [`encrypt`].
pub fn decrypt(key: &RouteKey, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < ENVELOPE_OVERHEAD {
        return Err(Error::MalformedInput {
            len: envelope.len(),
            min: ENVELOPE_OVERHEAD,
        });
    }

    let (nonce, ciphertext) = envelope.split_at(NONCE_SIZE);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::AuthFailure)
}
