//! Identity keypair management for sealtalk-crypto.
//!
//! Each user-device holds one long-lived RSA-OAEP (2048-bit, SHA-256) keypair.
//! The public half travels as base64 of its SPKI DER encoding, the exact
//! string the key directory stores. The private half is only ever encoded
//! as PKCS#8 DER for the local key store and has no serde impl, so it cannot
//! end up in a request body by accident.

use base64::Engine;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sealtalk_shared::constants::IDENTITY_KEY_BITS;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// A user's long-lived asymmetric identity.
#[derive(Clone)]
pub struct IdentityKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.fingerprint().unwrap_or_default())
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl IdentityKeyPair {
    /// Generate a fresh 2048-bit keypair from OS entropy.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, IDENTITY_KEY_BITS)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Rebuild a keypair from its stored encodings, rejecting halves that
    /// do not belong together.
    pub fn from_der(public_der: &[u8], private_der: &[u8]) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|e| CryptoError::InvalidKey(format!("private key: {e}")))?;
        let public = RsaPublicKey::from_public_key_der(public_der)
            .map_err(|e| CryptoError::InvalidKey(format!("public key: {e}")))?;

        if RsaPublicKey::from(&private) != public {
            return Err(CryptoError::InvalidKey(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self { private, public })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// SPKI DER encoding of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        encode_public_key_der(&self.public)
    }

    /// Base64 SPKI, the value published to the key directory.
    pub fn public_key_base64(&self) -> Result<String, CryptoError> {
        let der = self.public_key_der()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(der))
    }

    /// PKCS#8 DER encoding of the private half, for the local key store only.
    pub(crate) fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let doc = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// Hex SHA-256 of the SPKI DER.
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        Ok(fingerprint_der(&self.public_key_der()?))
    }
}

/// Parse a base64 SPKI public key as fetched from the directory.
pub fn parse_public_key(public_key_b64: &str) -> Result<RsaPublicKey, CryptoError> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(public_key_b64.trim())
        .map_err(|e| CryptoError::InvalidKey(format!("public key base64: {e}")))?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| CryptoError::InvalidKey(format!("public key: {e}")))
}

/// Fingerprint of a base64 SPKI public key.
pub fn public_key_fingerprint(public_key_b64: &str) -> Result<String, CryptoError> {
    let key = parse_public_key(public_key_b64)?;
    Ok(fingerprint_der(&encode_public_key_der(&key)?))
}

fn encode_public_key_der(key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

fn fingerprint_der(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
