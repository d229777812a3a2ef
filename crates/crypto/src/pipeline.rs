//! Decrypt pipeline: envelopes in, display-ready messages out.
//!
//! One bad envelope never blocks the rest of a conversation. Every
//! decrypt-time failure degrades that single message to the placeholder and
//! output order always matches input order.

use chrono::{DateTime, Utc};
use sealtalk_shared::api::message::{MessageEnvelope, MessageType};
use sealtalk_shared::constants::ENCRYPTED_PLACEHOLDER;
use sealtalk_shared::ids::{RoomId, UserId};

use crate::cipher;
use crate::error::CryptoError;
use crate::identity::IdentityKeyPair;
use crate::send_cache::SendCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBody {
    Text(String),
    /// Decrypted URL reference for an image or document; resolved by the renderer.
    Attachment { url: String },
    /// Shown in place of a message that could not be decrypted.
    Placeholder,
}

impl DisplayBody {
    pub fn as_text(&self) -> &str {
        match self {
            DisplayBody::Text(text) => text,
            DisplayBody::Attachment { url } => url,
            DisplayBody::Placeholder => ENCRYPTED_PLACEHOLDER,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DisplayBody::Placeholder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub created_at: DateTime<Utc>,
    pub message_type: MessageType,
    pub file_name: Option<String>,
    pub body: DisplayBody,
}

/// What the pipeline needs to know about the local user.
#[derive(Debug, Clone, Copy)]
pub struct DecryptContext<'a> {
    pub user_id: UserId,
    /// `None` when no identity is loaded on this device.
    pub identity: Option<&'a IdentityKeyPair>,
    pub send_cache: &'a SendCache,
}

/// Plaintext for `envelope`: from the send cache if this session sent it,
/// otherwise by decrypting with the local identity.
pub fn resolve_plaintext(envelope: &MessageEnvelope, ctx: &DecryptContext<'_>) -> Result<String, CryptoError> {
    if envelope.sender_id == ctx.user_id {
        if let Some(plaintext) = ctx.send_cache.get(&envelope.room_id, &envelope.created_at) {
            return Ok(plaintext);
        }
    }
    let identity = ctx.identity.ok_or(CryptoError::IdentityNotInitialized)?;
    cipher::decrypt(envelope, &ctx.user_id, identity)
}

impl DisplayMessage {
    fn from_envelope(envelope: &MessageEnvelope, body: DisplayBody) -> Self {
        Self {
            room_id: envelope.room_id,
            sender_id: envelope.sender_id,
            created_at: envelope.created_at,
            message_type: envelope.message_type,
            file_name: envelope.file_name.clone(),
            body,
        }
    }

    /// The placeholder entry for `envelope`.
    pub fn placeholder(envelope: &MessageEnvelope) -> Self {
        Self::from_envelope(envelope, DisplayBody::Placeholder)
    }
}

pub fn decrypt_one(envelope: &MessageEnvelope, ctx: &DecryptContext<'_>) -> DisplayMessage {
    let body = match resolve_plaintext(envelope, ctx) {
        Ok(plaintext) if envelope.message_type.is_attachment() => DisplayBody::Attachment { url: plaintext },
        Ok(plaintext) => DisplayBody::Text(plaintext),
        Err(e) => {
            if e.is_display_degradable() || matches!(e, CryptoError::IdentityNotInitialized) {
                tracing::debug!(
                    room_id = %envelope.room_id,
                    sender_id = %envelope.sender_id,
                    error = %e,
                    "message degraded to placeholder"
                );
            } else {
                tracing::warn!(
                    room_id = %envelope.room_id,
                    sender_id = %envelope.sender_id,
                    error = %e,
                    "unexpected decrypt failure, showing placeholder"
                );
            }
            DisplayBody::Placeholder
        }
    };

    DisplayMessage::from_envelope(envelope, body)
}

/// Decrypt a room's history in order. Always yields one entry per envelope.
pub fn decrypt_history(envelopes: &[MessageEnvelope], ctx: &DecryptContext<'_>) -> Vec<DisplayMessage> {
    envelopes.iter().map(|envelope| decrypt_one(envelope, ctx)).collect()
}
