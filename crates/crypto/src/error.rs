//! Error types for the sealtalk-crypto crate.

use sealtalk_shared::ids::UserId;
use thiserror::Error;

/// Errors that can occur during cryptographic and key-lifecycle operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A required recipient has no usable public key. Fatal to that send.
    #[error("public key unavailable for user {user_id}")]
    KeyUnavailable { user_id: UserId },

    /// The envelope carries no wrapped session key for the local user.
    #[error("not a recipient of this message")]
    NotARecipient,

    /// The wrapped session key could not be unwrapped with the local private key.
    #[error("session key unwrap failed: {0}")]
    KeyUnwrapFailed(String),

    /// The content failed authentication under the unwrapped session key.
    #[error("content decryption failed")]
    ContentDecryptFailed,

    /// A self-authored envelope in the legacy single-key shape; the sender's
    /// own copy of the session key was never wrapped.
    #[error("self-encrypted message cannot be recovered")]
    SelfEncryptedUnavailable,

    /// Publishing the public key to the directory failed.
    #[error("directory publish failed: {0}")]
    DirectoryPublishFailed(String),

    /// Looking up a public key in the directory failed.
    #[error("directory lookup failed: {0}")]
    DirectoryLookupFailed(String),

    /// An envelope field is not well-formed (bad base64, wrong IV length, etc.).
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The provided key material is invalid (wrong length, malformed, etc.).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// No identity keypair has been established yet.
    #[error("identity not initialized")]
    IdentityNotInitialized,

    /// Database storage error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// OS keychain operation failed.
    #[error("keychain error: {0}")]
    KeychainError(String),

    /// No credential found in OS keychain for the requested entry.
    #[error("keychain entry not found")]
    KeychainEntryNotFound,

    /// OS keychain is not available on this platform; triggers passphrase fallback.
    #[error("keychain unavailable")]
    KeychainUnavailable,

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl CryptoError {
    /// Decrypt-time failures that degrade a single message to the placeholder
    /// instead of blocking the conversation.
    pub fn is_display_degradable(&self) -> bool {
        matches!(
            self,
            CryptoError::NotARecipient
                | CryptoError::KeyUnwrapFailed(_)
                | CryptoError::ContentDecryptFailed
                | CryptoError::SelfEncryptedUnavailable
                | CryptoError::MalformedEnvelope(_)
        )
    }
}

impl From<rusqlite::Error> for CryptoError {
    fn from(err: rusqlite::Error) -> Self {
        CryptoError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

impl From<CryptoError> for sealtalk_shared::error::SealTalkError {
    fn from(err: CryptoError) -> Self {
        sealtalk_shared::error::SealTalkError::Crypto(err.to_string())
    }
}

impl From<keyring::Error> for CryptoError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => CryptoError::KeychainEntryNotFound,
            keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_) => {
                CryptoError::KeychainUnavailable
            }
            other => CryptoError::KeychainError(other.to_string()),
        }
    }
}
