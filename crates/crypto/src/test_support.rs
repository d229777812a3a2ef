//! Shared fixtures for unit tests. RSA key generation is slow, so each
//! fixture identity is generated once per test binary.

use std::sync::OnceLock;

use chrono::Utc;
use sealtalk_shared::api::message::{MessageEnvelope, MessageType};
use sealtalk_shared::ids::{RoomId, UserId};

use crate::cipher::EncryptedContent;
use crate::identity::IdentityKeyPair;

fn cached(cell: &'static OnceLock<IdentityKeyPair>) -> &'static IdentityKeyPair {
    cell.get_or_init(|| IdentityKeyPair::generate().unwrap())
}

pub(crate) fn alice() -> &'static IdentityKeyPair {
    static KEY: OnceLock<IdentityKeyPair> = OnceLock::new();
    cached(&KEY)
}

pub(crate) fn bob() -> &'static IdentityKeyPair {
    static KEY: OnceLock<IdentityKeyPair> = OnceLock::new();
    cached(&KEY)
}

pub(crate) fn carol() -> &'static IdentityKeyPair {
    static KEY: OnceLock<IdentityKeyPair> = OnceLock::new();
    cached(&KEY)
}

pub(crate) fn envelope_from(room_id: RoomId, sender_id: UserId, encrypted: &EncryptedContent) -> MessageEnvelope {
    MessageEnvelope {
        room_id,
        sender_id,
        content: encrypted.content.clone(),
        encrypted_key: encrypted.encrypted_key.clone(),
        iv: encrypted.iv.clone(),
        message_type: MessageType::Text,
        file_name: None,
        created_at: Utc::now(),
    }
}
