//! sealtalk-crypto: end-to-end message encryption for SealTalk.
//!
//! Provides RSA identity keypairs, hybrid AES-256-GCM/RSA-OAEP message
//! encryption with per-recipient key wrapping, the identity key lifecycle
//! against a key directory, and the decrypt pipeline that turns envelopes
//! into display-ready messages. Key material is kept in an encrypted
//! SQLite (SQLCipher) store.

pub mod cipher;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod pipeline;
pub mod send_cache;
pub mod session_key;
pub mod storage;
pub mod vault;

#[cfg(test)]
mod test_support;
