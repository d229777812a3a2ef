use crate::ids::{RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of payload carried by an envelope. Attachment kinds carry a URL
/// reference as their plaintext, never inline file bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Document,
}

impl MessageType {
    pub fn is_attachment(&self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

/// Encrypted message as persisted by the message store and broadcast to room members.
///
/// `encrypted_key` is either a JSON object mapping user IDs to base64 wrapped
/// session keys, or (legacy) one bare base64 wrapped key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub encrypted_key: String,
    pub iv: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload a client emits when sending; the message store stamps `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub encrypted_key: String,
    pub iv: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl OutgoingMessage {
    /// Attach a creation timestamp, producing the stored envelope shape.
    pub fn into_envelope(self, created_at: DateTime<Utc>) -> MessageEnvelope {
        MessageEnvelope {
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content,
            encrypted_key: self.encrypted_key,
            iv: self.iv,
            message_type: self.message_type,
            file_name: self.file_name,
            created_at,
        }
    }
}
