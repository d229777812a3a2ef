use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rusqlite::Connection;
use sealtalk_crypto::cipher::{self, RecipientKeys};
use sealtalk_crypto::directory::{fetch_room_keys, KeyDirectory};
use sealtalk_crypto::error::CryptoError;
use sealtalk_crypto::identity::IdentityKeyPair;
use sealtalk_crypto::lifecycle::{self, KeyState, SessionIdentity};
use sealtalk_crypto::pipeline::{decrypt_one, DecryptContext, DisplayMessage};
use sealtalk_crypto::send_cache::SendCache;
use sealtalk_crypto::storage::LocalKeyStore;
use sealtalk_crypto::vault::{open_key_store, VaultKey};
use sealtalk_shared::api::message::{MessageEnvelope, MessageType, OutgoingMessage};
use sealtalk_shared::constants::MAX_MESSAGE_SIZE_BYTES;
use sealtalk_shared::ids::{RoomId, UserId};

use crate::config::ClientConfig;
use crate::directory::HttpKeyDirectory;
use crate::error::ClientError;

const HISTORY_CONCURRENCY: usize = 8;

/// A message ready to hand to the transport, plus its local echo.
#[derive(Debug, Clone)]
pub struct ComposedMessage {
    pub outgoing: OutgoingMessage,
    /// Client-side stamp; the send-cache key for this message.
    pub created_at: DateTime<Utc>,
    pub local_echo: DisplayMessage,
}

impl ComposedMessage {
    /// The stored envelope shape, assuming the store keeps the client stamp.
    pub fn envelope(&self) -> MessageEnvelope {
        self.outgoing.clone().into_envelope(self.created_at)
    }
}

/// One signed-in user's encrypted chat state on this device.
///
/// Holds the local key store, the loaded identity (if any), the send cache,
/// and the recipient keys of every open room.
pub struct ChatSession<D = HttpKeyDirectory> {
    user_id: UserId,
    key_store: Mutex<Connection>,
    directory: D,
    /// Loaded once at session start and held until the session ends, instead
    /// of being reloaded from the key store for every operation. Cleared from
    /// memory on drop.
    identity: Option<Arc<IdentityKeyPair>>,
    key_state: KeyState,
    send_cache: Arc<SendCache>,
    rooms: Mutex<HashMap<RoomId, RecipientKeys>>,
}

impl ChatSession<HttpKeyDirectory> {
    /// Open the on-disk key store and start a session against the configured server.
    pub async fn connect(config: &ClientConfig, user_id: UserId, vault: &VaultKey) -> Result<Self, ClientError> {
        let conn = open_key_store(&config.key_store_path, vault)?;
        let directory = HttpKeyDirectory::new(config)?;
        let send_cache = SendCache::new(config.send_cache_ttl(), config.send_cache_capacity);
        Self::start(user_id, conn, directory, send_cache).await
    }
}

impl<D: KeyDirectory> ChatSession<D> {
    /// Session start: load or generate the identity, then publish it.
    ///
    /// `conn` must be a keyed, migrated key store. A session without a usable
    /// identity still starts; it can read cached sends only and cannot send.
    pub async fn start(
        user_id: UserId,
        conn: Connection,
        directory: D,
        send_cache: SendCache,
    ) -> Result<Self, ClientError> {
        let key_store = Mutex::new(conn);
        let (identity, key_state) = match lifecycle::bootstrap(&key_store, &directory, &user_id).await {
            Ok(SessionIdentity { keypair, state }) => (Some(keypair), state),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "session start failed");
                // A pair may still be stored even though recording the publish failed.
                match key_store.load() {
                    Ok(Some(keypair)) => (Some(keypair), KeyState::Generated),
                    _ => {
                        tracing::error!(user_id = %user_id, "no usable identity; incoming messages will stay encrypted");
                        (None, KeyState::Absent)
                    }
                }
            }
        };
        tracing::info!(user_id = %user_id, ?key_state, "chat session started");

        Ok(Self {
            user_id,
            key_store,
            directory,
            identity: identity.map(Arc::new),
            key_state,
            send_cache: Arc::new(send_cache),
            rooms: Mutex::new(HashMap::new()),
        })
    }

    fn lock_rooms(&self) -> Result<MutexGuard<'_, HashMap<RoomId, RecipientKeys>>, ClientError> {
        self.rooms.lock().map_err(|_| ClientError::LockPoisoned)
    }

    fn ctx(&self) -> DecryptContext<'_> {
        DecryptContext {
            user_id: self.user_id,
            identity: self.identity.as_deref(),
            send_cache: &self.send_cache,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Lifecycle state reached by this session.
    pub fn key_state(&self) -> KeyState {
        self.key_state
    }

    /// Lifecycle state as recorded in the local key store.
    pub fn stored_key_state(&self) -> Result<KeyState, ClientError> {
        Ok(lifecycle::key_state(&self.key_store)?)
    }

    pub fn fingerprint(&self) -> Result<Option<String>, ClientError> {
        self.identity
            .as_deref()
            .map(IdentityKeyPair::fingerprint)
            .transpose()
            .map_err(ClientError::from)
    }

    /// Fetch fresh public keys for every member and keep them for sending.
    ///
    /// Fails with `KeyUnavailable` if any other member has no usable key. The
    /// local user's own entry always comes from the loaded identity.
    pub async fn open_room(&self, room_id: RoomId, members: &[UserId]) -> Result<(), ClientError> {
        let others: Vec<UserId> = members
            .iter()
            .copied()
            .filter(|member| *member != self.user_id)
            .collect();

        let mut keys = fetch_room_keys(&self.directory, &others).await?;
        if let Some(identity) = &self.identity {
            keys.insert(self.user_id, identity.public_key().clone());
        }

        tracing::debug!(room_id = %room_id, recipients = keys.len(), "room keys fetched");
        self.lock_rooms()?.insert(room_id, keys);
        Ok(())
    }

    /// Forget a room's keys. In-flight work for it is simply discarded.
    pub fn close_room(&self, room_id: &RoomId) -> Result<(), ClientError> {
        self.lock_rooms()?.remove(room_id);
        Ok(())
    }

    /// Encrypt a text message to every member of an open room.
    pub fn compose(&self, room_id: RoomId, text: &str) -> Result<ComposedMessage, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.seal(room_id, text, MessageType::Text, None)
    }

    /// Encrypt an uploaded file's URL reference as an image or document message.
    pub fn compose_attachment(
        &self,
        room_id: RoomId,
        url: &str,
        message_type: MessageType,
        file_name: Option<String>,
    ) -> Result<ComposedMessage, ClientError> {
        if !message_type.is_attachment() {
            return Err(ClientError::NotAnAttachment(message_type));
        }
        if url.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.seal(room_id, url, message_type, file_name)
    }

    fn seal(
        &self,
        room_id: RoomId,
        plaintext: &str,
        message_type: MessageType,
        file_name: Option<String>,
    ) -> Result<ComposedMessage, ClientError> {
        if plaintext.len() > MAX_MESSAGE_SIZE_BYTES {
            return Err(ClientError::MessageTooLarge {
                size: plaintext.len(),
                max: MAX_MESSAGE_SIZE_BYTES,
            });
        }
        if self.identity.is_none() {
            return Err(CryptoError::IdentityNotInitialized.into());
        }
        let keys = self
            .lock_rooms()?
            .get(&room_id)
            .cloned()
            .ok_or(ClientError::RoomNotOpen(room_id))?;

        let encrypted = cipher::encrypt(plaintext, &keys)?;
        let created_at = Utc::now();
        self.send_cache.insert(room_id, created_at, plaintext);

        let outgoing = OutgoingMessage {
            room_id,
            sender_id: self.user_id,
            content: encrypted.content,
            encrypted_key: encrypted.encrypted_key,
            iv: encrypted.iv,
            message_type,
            file_name,
        };
        let local_echo = decrypt_one(&outgoing.clone().into_envelope(created_at), &self.ctx());
        tracing::debug!(room_id = %room_id, recipients = keys.len(), ?message_type, "message encrypted");

        Ok(ComposedMessage {
            outgoing,
            created_at,
            local_echo,
        })
    }

    /// Handle a live envelope from the transport. Echoes of this user's own
    /// sends return `None`; they were already shown via the local echo.
    pub fn receive(&self, envelope: &MessageEnvelope) -> Option<DisplayMessage> {
        if envelope.sender_id == self.user_id {
            return None;
        }
        Some(decrypt_one(envelope, &self.ctx()))
    }

    /// Decrypt a room's history concurrently, preserving order.
    pub async fn render_history(&self, envelopes: Vec<MessageEnvelope>) -> Vec<DisplayMessage> {
        let tasks = envelopes.into_iter().map(|envelope| {
            let user_id = self.user_id;
            let identity = self.identity.clone();
            let send_cache = Arc::clone(&self.send_cache);
            async move {
                let fallback = DisplayMessage::placeholder(&envelope);
                tokio::task::spawn_blocking(move || {
                    let ctx = DecryptContext {
                        user_id,
                        identity: identity.as_deref(),
                        send_cache: &send_cache,
                    };
                    decrypt_one(&envelope, &ctx)
                })
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "history decrypt task failed");
                    fallback
                })
            }
        });

        stream::iter(tasks).buffered(HISTORY_CONCURRENCY).collect().await
    }

    /// Discard the stored identity and start over with a new one.
    ///
    /// For unrecoverable local key loss only: envelopes wrapped to the old
    /// public key become permanently unreadable on this device.
    pub async fn regenerate_identity(&mut self) -> Result<KeyState, ClientError> {
        let keypair = Arc::new(lifecycle::regenerate(&self.key_store)?);
        for keys in self.lock_rooms()?.values_mut() {
            keys.insert(self.user_id, keypair.public_key().clone());
        }
        self.identity = Some(Arc::clone(&keypair));
        self.key_state = KeyState::Generated;

        self.key_state =
            lifecycle::publish_and_record(&self.key_store, &self.directory, &self.user_id, &keypair).await?;
        Ok(self.key_state)
    }
}
