//! Key directory seam.
//!
//! The directory maps a user ID to that user's current public key (base64
//! SPKI). It holds at most one record per user and every publish overwrites
//! it. Lookups are never cached here: a partner may have rotated keys since
//! the last conversation, so room keys are fetched fresh each time a room opens.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::try_join_all;
use sealtalk_shared::ids::UserId;

use crate::cipher::RecipientKeys;
use crate::error::CryptoError;
use crate::identity::parse_public_key;

#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Publish (overwrite) `user_id`'s public key.
    async fn publish(&self, user_id: &UserId, public_key_b64: &str) -> Result<(), CryptoError>;

    /// Current public key for `user_id`, or `None` if never published.
    async fn lookup(&self, user_id: &UserId) -> Result<Option<String>, CryptoError>;
}

/// Process-local directory, used by tests and offline tooling.
#[derive(Debug, Default)]
pub struct InMemoryKeyDirectory {
    records: Mutex<HashMap<UserId, String>>,
}

impl InMemoryKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyDirectory for InMemoryKeyDirectory {
    async fn publish(&self, user_id: &UserId, public_key_b64: &str) -> Result<(), CryptoError> {
        self.records
            .lock()
            .map_err(|_| CryptoError::DirectoryPublishFailed("directory lock poisoned".into()))?
            .insert(*user_id, public_key_b64.to_string());
        Ok(())
    }

    async fn lookup(&self, user_id: &UserId) -> Result<Option<String>, CryptoError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| CryptoError::DirectoryLookupFailed("directory lock poisoned".into()))?
            .get(user_id)
            .cloned())
    }
}

#[async_trait]
impl<T: KeyDirectory + ?Sized> KeyDirectory for std::sync::Arc<T> {
    async fn publish(&self, user_id: &UserId, public_key_b64: &str) -> Result<(), CryptoError> {
        (**self).publish(user_id, public_key_b64).await
    }

    async fn lookup(&self, user_id: &UserId) -> Result<Option<String>, CryptoError> {
        (**self).lookup(user_id).await
    }
}

/// Fetch and parse current public keys for every member of a room.
///
/// All lookups run concurrently. A member with no record or an unparseable
/// key fails the whole call with `KeyUnavailable`: a send must never proceed
/// with a recipient silently left out.
pub async fn fetch_room_keys<D: KeyDirectory + ?Sized>(
    directory: &D,
    members: &[UserId],
) -> Result<RecipientKeys, CryptoError> {
    let lookups = members.iter().map(|user_id| async move {
        let record = directory.lookup(user_id).await?;
        let b64 = record.ok_or(CryptoError::KeyUnavailable { user_id: *user_id })?;
        let key = parse_public_key(&b64).map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "directory returned unusable public key");
            CryptoError::KeyUnavailable { user_id: *user_id }
        })?;
        Ok::<_, CryptoError>((*user_id, key))
    });

    Ok(try_join_all(lookups).await?.into_iter().collect())
}
