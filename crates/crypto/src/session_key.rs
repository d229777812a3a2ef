//! One-time AES-256-GCM message keys.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sealtalk_shared::constants::{IV_LEN, SESSION_KEY_LEN};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// A 32-byte AES-256 key used for exactly one envelope, zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; SESSION_KEY_LEN],
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SessionKey {
    pub fn generate() -> Self {
        let mut key = [0u8; SESSION_KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Import raw key bytes recovered from an unwrapped session key.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; SESSION_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::KeyUnwrapFailed(format!(
                "unwrapped session key is {} bytes, expected {SESSION_KEY_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Raw export for wrapping.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.key
    }

    /// Encrypt under this key, returning `ciphertext || tag`.
    pub fn seal(&self, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        cipher
            .encrypt(
                Nonce::from_slice(iv),
                Payload {
                    msg: plaintext,
                    aad: &[],
                },
            )
            .map_err(|_| CryptoError::InvalidKey("content encryption failed".into()))
    }

    /// Decrypt and authenticate `ciphertext || tag`.
    pub fn open(&self, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        cipher
            .decrypt(
                Nonce::from_slice(iv),
                Payload {
                    msg: ciphertext,
                    aad: &[],
                },
            )
            .map_err(|_| CryptoError::ContentDecryptFailed)
    }
}

/// A fresh random 96-bit IV.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    iv
}
