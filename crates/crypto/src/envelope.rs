//! The `encryptedKey` envelope field.
//!
//! Current senders write a JSON object mapping every recipient's user ID to
//! their base64 wrapped session key. Older clients wrote a single bare base64
//! key. The shape is decided once by attempting the map parse; nothing else
//! inspects the raw string.

use std::collections::BTreeMap;

use sealtalk_shared::ids::UserId;

use crate::error::CryptoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrappedKeys {
    /// One wrapped key with no recipient label.
    LegacySingleKey(String),
    /// Recipient user ID → base64 RSA-OAEP wrapped session key.
    MultiRecipient(BTreeMap<UserId, String>),
}

impl WrappedKeys {
    /// Classify a raw `encryptedKey` value. Anything that is not a
    /// well-formed `userId → string` JSON object is treated as legacy.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<BTreeMap<UserId, String>>(raw) {
            Ok(map) => WrappedKeys::MultiRecipient(map),
            Err(_) => WrappedKeys::LegacySingleKey(raw.to_string()),
        }
    }

    /// Encode for the `encryptedKey` wire field.
    pub fn to_wire(&self) -> Result<String, CryptoError> {
        match self {
            WrappedKeys::LegacySingleKey(key) => Ok(key.clone()),
            WrappedKeys::MultiRecipient(map) => Ok(serde_json::to_string(map)?),
        }
    }

    /// The wrapped key addressed to `user_id`, if any. A legacy key carries
    /// no label, so it is offered to whoever asks.
    pub fn key_for(&self, user_id: &UserId) -> Option<&str> {
        match self {
            WrappedKeys::LegacySingleKey(key) => Some(key.as_str()),
            WrappedKeys::MultiRecipient(map) => map.get(user_id).map(String::as_str),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, WrappedKeys::LegacySingleKey(_))
    }

    /// Labelled recipients. Empty for the legacy shape.
    pub fn recipients(&self) -> Vec<UserId> {
        match self {
            WrappedKeys::LegacySingleKey(_) => Vec::new(),
            WrappedKeys::MultiRecipient(map) => map.keys().copied().collect(),
        }
    }
}
