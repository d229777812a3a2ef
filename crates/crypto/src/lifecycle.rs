//! Identity key lifecycle.
//!
//! ```text
//! Absent ──generate──▶ Generated ──publish──▶ Published ──session start──▶ Active
//!                          ▲                                                  │
//!                          └──────────── regenerate (store loss) ─────────────┘
//! ```
//!
//! Keys are generated once per user-device and never regenerated while a
//! valid pair is stored. The public half is re-published on every session
//! start, overwriting the directory record. A failed publish is not fatal and
//! never discards local keys; it is retried on the next session start.

use sealtalk_shared::ids::UserId;

use crate::directory::KeyDirectory;
use crate::error::CryptoError;
use crate::identity::IdentityKeyPair;
use crate::storage::LocalKeyStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No keypair stored locally.
    Absent,
    /// Stored locally; the directory may not have the current public key.
    Generated,
    /// Stored locally and the current public key was published at some point.
    Published,
    /// Published during this session.
    Active,
}

/// A loaded identity plus where it stands in the lifecycle.
#[derive(Debug)]
pub struct SessionIdentity {
    pub keypair: IdentityKeyPair,
    pub state: KeyState,
}

/// Persistent lifecycle state as recorded in `store`.
pub fn key_state<S: LocalKeyStore + ?Sized>(store: &S) -> Result<KeyState, CryptoError> {
    let Some(keypair) = store.load()? else {
        return Ok(KeyState::Absent);
    };
    let published = store.published_fingerprint()?;
    if published.as_deref() == Some(keypair.fingerprint()?.as_str()) {
        Ok(KeyState::Published)
    } else {
        Ok(KeyState::Generated)
    }
}

/// Load the stored identity, generating and persisting one if absent.
///
/// Only a failed generation clears local key state. A failed save leaves the
/// store untouched, and if another writer stored a pair first that pair is
/// returned instead.
pub fn establish_identity<S: LocalKeyStore + ?Sized>(store: &S) -> Result<IdentityKeyPair, CryptoError> {
    establish_with(store, IdentityKeyPair::generate)
}

fn establish_with<S, G>(store: &S, generate: G) -> Result<IdentityKeyPair, CryptoError>
where
    S: LocalKeyStore + ?Sized,
    G: FnOnce() -> Result<IdentityKeyPair, CryptoError>,
{
    if let Some(keypair) = store.load()? {
        tracing::debug!("loaded existing identity keypair");
        return Ok(keypair);
    }

    tracing::info!("generating new identity keypair");
    let keypair = match generate() {
        Ok(keypair) => keypair,
        Err(e) => {
            tracing::error!(error = %e, "identity generation failed, clearing local key state");
            if let Err(clear_err) = store.clear() {
                tracing::warn!(error = %clear_err, "failed to clear partial identity");
            }
            return Err(e);
        }
    };

    // `save` is transactional: on error nothing of this pair was written.
    match store.save(&keypair) {
        Ok(()) => Ok(keypair),
        Err(save_err) => match store.load() {
            Ok(Some(existing)) => {
                tracing::warn!(error = %save_err, "identity stored concurrently, using the stored pair");
                Ok(existing)
            }
            _ => {
                tracing::error!(error = %save_err, "failed to persist new identity");
                Err(save_err)
            }
        },
    }
}

/// Publish the public half. Returns whether the directory accepted it.
///
/// Failures are logged and swallowed; the caller keeps its keys.
pub async fn publish_identity<D: KeyDirectory + ?Sized>(
    directory: &D,
    user_id: &UserId,
    keypair: &IdentityKeyPair,
) -> bool {
    let result = match keypair.public_key_base64() {
        Ok(public_key) => directory.publish(user_id, &public_key).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            tracing::info!(user_id = %user_id, "published public key");
            true
        }
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "could not publish public key; others may be unable to message this user until next session"
            );
            false
        }
    }
}

/// Publish `keypair` and, if the directory accepted it, record the publish.
///
/// Returns `Active` on success and `Generated` when publishing failed.
pub async fn publish_and_record<S, D>(
    store: &S,
    directory: &D,
    user_id: &UserId,
    keypair: &IdentityKeyPair,
) -> Result<KeyState, CryptoError>
where
    S: LocalKeyStore + ?Sized,
    D: KeyDirectory + ?Sized,
{
    if publish_identity(directory, user_id, keypair).await {
        store.mark_published(&keypair.fingerprint()?)?;
        Ok(KeyState::Active)
    } else {
        Ok(KeyState::Generated)
    }
}

/// Run the session-start sequence: establish, publish, record.
pub async fn bootstrap<S, D>(store: &S, directory: &D, user_id: &UserId) -> Result<SessionIdentity, CryptoError>
where
    S: LocalKeyStore + ?Sized,
    D: KeyDirectory + ?Sized,
{
    let keypair = establish_identity(store)?;
    let state = publish_and_record(store, directory, user_id, &keypair).await?;
    Ok(SessionIdentity { keypair, state })
}

/// Replace the stored identity after unrecoverable local-store loss.
///
/// Messages wrapped to the old public key become unreadable on this device.
pub fn regenerate<S: LocalKeyStore + ?Sized>(store: &S) -> Result<IdentityKeyPair, CryptoError> {
    tracing::warn!("regenerating identity keypair; previous key material is discarded");
    store.clear()?;
    establish_identity(store)
}
