//! Hybrid message encryption: AES-256-GCM content under a one-time session
//! key, with the session key wrapped per recipient by RSA-OAEP (SHA-256).
//!
//! Both directions are pure functions over their inputs. An envelope's
//! confidentiality boundary is exactly its wrapped-key map.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::rand_core::OsRng;
use rsa::{Oaep, RsaPublicKey};
use sealtalk_shared::api::message::MessageEnvelope;
use sealtalk_shared::constants::IV_LEN;
use sealtalk_shared::ids::UserId;
use sha2::Sha256;

use crate::envelope::WrappedKeys;
use crate::error::CryptoError;
use crate::identity::IdentityKeyPair;
use crate::session_key::{generate_iv, SessionKey};

/// Public keys of everyone who must be able to read a message, sender included.
pub type RecipientKeys = BTreeMap<UserId, RsaPublicKey>;

/// Encrypted envelope fields produced by [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContent {
    /// base64 of `ciphertext || tag`.
    pub content: String,
    /// JSON map of recipient → base64 wrapped session key.
    pub encrypted_key: String,
    /// base64 of the 96-bit IV.
    pub iv: String,
}

/// Encrypt `plaintext` once and wrap its session key for every recipient.
///
/// Either every recipient gets a wrapped key or the call fails; there is no
/// partial result with a recipient silently dropped. Missing members are
/// reported as `KeyUnavailable` by [`crate::directory::fetch_room_keys`]
/// before this is called. An empty map names no user to blame and is
/// rejected as `InvalidKey`.
pub fn encrypt(plaintext: &str, recipients: &RecipientKeys) -> Result<EncryptedContent, CryptoError> {
    if recipients.is_empty() {
        return Err(CryptoError::InvalidKey("no recipient keys supplied".into()));
    }

    let session_key = SessionKey::generate();
    let iv = generate_iv();
    let sealed = session_key.seal(&iv, plaintext.as_bytes())?;

    let mut wrapped = BTreeMap::new();
    for (user_id, public_key) in recipients {
        let wrapped_key = public_key
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), session_key.as_bytes())
            .map_err(|e| {
                tracing::warn!(user_id = %user_id, error = %e, "session key wrap failed");
                CryptoError::KeyUnavailable { user_id: *user_id }
            })?;
        wrapped.insert(*user_id, STANDARD.encode(wrapped_key));
    }

    Ok(EncryptedContent {
        content: STANDARD.encode(sealed),
        encrypted_key: WrappedKeys::MultiRecipient(wrapped).to_wire()?,
        iv: STANDARD.encode(iv),
    })
}

/// Recover the plaintext of `envelope` as `my_user_id`.
pub fn decrypt(
    envelope: &MessageEnvelope,
    my_user_id: &UserId,
    identity: &IdentityKeyPair,
) -> Result<String, CryptoError> {
    let wrapped_keys = WrappedKeys::parse(&envelope.encrypted_key);

    // A self-authored legacy envelope only carried the partner's wrapped key.
    if wrapped_keys.is_legacy() && envelope.sender_id == *my_user_id {
        return Err(CryptoError::SelfEncryptedUnavailable);
    }

    let wrapped = wrapped_keys
        .key_for(my_user_id)
        .ok_or(CryptoError::NotARecipient)?;

    let session_key = unwrap_session_key(wrapped, identity)?;

    let iv = decode_iv(&envelope.iv)?;
    let ciphertext = STANDARD
        .decode(envelope.content.trim())
        .map_err(|_| CryptoError::ContentDecryptFailed)?;
    let plaintext = session_key.open(&iv, &ciphertext)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::MalformedEnvelope("plaintext is not valid UTF-8".into()))
}

fn unwrap_session_key(wrapped_b64: &str, identity: &IdentityKeyPair) -> Result<SessionKey, CryptoError> {
    let wrapped = STANDARD
        .decode(wrapped_b64.trim())
        .map_err(|e| CryptoError::KeyUnwrapFailed(format!("wrapped key base64: {e}")))?;
    let raw = zeroize::Zeroizing::new(
        identity
            .private_key()
            .decrypt(Oaep::new::<Sha256>(), &wrapped)
            .map_err(|e| CryptoError::KeyUnwrapFailed(e.to_string()))?,
    );
    SessionKey::from_slice(&raw)
}

fn decode_iv(iv_b64: &str) -> Result<[u8; IV_LEN], CryptoError> {
    let bytes = STANDARD
        .decode(iv_b64.trim())
        .map_err(|e| CryptoError::MalformedEnvelope(format!("iv base64: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::MalformedEnvelope(format!("iv is {} bytes, expected {IV_LEN}", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{alice, bob, carol, envelope_from};
    use sealtalk_shared::ids::RoomId;

    fn keys_for(entries: &[(UserId, &IdentityKeyPair)]) -> RecipientKeys {
        entries
            .iter()
            .map(|(id, pair)| (*id, pair.public_key().clone()))
            .collect()
    }

    #[test]
    fn single_recipient_round_trip() {
        let bob_id = UserId::new();
        let encrypted = encrypt("hello", &keys_for(&[(bob_id, bob())])).unwrap();
        let envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);

        assert_eq!(decrypt(&envelope, &bob_id, bob()).unwrap(), "hello");
    }

    #[test]
    fn round_trip_preserves_unicode_and_empty_strings() {
        let bob_id = UserId::new();
        let keys = keys_for(&[(bob_id, bob())]);
        for plaintext in ["", "héllo wörld 👋", "line one\nline two", "/uploads/a b.png"] {
            let encrypted = encrypt(plaintext, &keys).unwrap();
            let envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);
            assert_eq!(decrypt(&envelope, &bob_id, bob()).unwrap(), plaintext);
        }
    }

    #[test]
    fn multi_recipient_isolation() {
        let (alice_id, bob_id, carol_id) = (UserId::new(), UserId::new(), UserId::new());
        let encrypted = encrypt("for A and B", &keys_for(&[(alice_id, alice()), (bob_id, bob())])).unwrap();
        let envelope = envelope_from(RoomId::new(), alice_id, &encrypted);

        assert_eq!(decrypt(&envelope, &alice_id, alice()).unwrap(), "for A and B");
        assert_eq!(decrypt(&envelope, &bob_id, bob()).unwrap(), "for A and B");
        assert!(matches!(
            decrypt(&envelope, &carol_id, carol()),
            Err(CryptoError::NotARecipient)
        ));
    }

    #[test]
    fn third_party_key_under_recipient_label_fails_unwrap() {
        let bob_id = UserId::new();
        let encrypted = encrypt("private", &keys_for(&[(bob_id, bob())])).unwrap();
        let envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);

        let result = decrypt(&envelope, &bob_id, carol());
        assert!(matches!(result, Err(CryptoError::KeyUnwrapFailed(_))));
    }

    #[test]
    fn wrapped_keys_cover_every_recipient() {
        let (alice_id, bob_id) = (UserId::new(), UserId::new());
        let encrypted = encrypt("hi", &keys_for(&[(alice_id, alice()), (bob_id, bob())])).unwrap();

        let mut recipients = WrappedKeys::parse(&encrypted.encrypted_key).recipients();
        recipients.sort();
        let mut expected = vec![alice_id, bob_id];
        expected.sort();
        assert_eq!(recipients, expected);
    }

    #[test]
    fn same_plaintext_twice_yields_distinct_iv_and_ciphertext() {
        let bob_id = UserId::new();
        let keys = keys_for(&[(bob_id, bob())]);
        let first = encrypt("same", &keys).unwrap();
        let second = encrypt("same", &keys).unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.content, second.content);
        assert_eq!(STANDARD.decode(&first.iv).unwrap().len(), IV_LEN);
    }

    #[test]
    fn flipping_any_ciphertext_bit_fails_authentication() {
        let bob_id = UserId::new();
        let encrypted = encrypt("tamper me", &keys_for(&[(bob_id, bob())])).unwrap();
        let raw = STANDARD.decode(&encrypted.content).unwrap();

        for bit in 0..raw.len() * 8 {
            let mut tampered = raw.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            let mut envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);
            envelope.content = STANDARD.encode(&tampered);

            let result = decrypt(&envelope, &bob_id, bob());
            assert!(
                matches!(result, Err(CryptoError::ContentDecryptFailed)),
                "bit {bit} was not detected"
            );
        }
    }

    #[test]
    fn legacy_key_on_self_authored_envelope_is_self_encrypted_unavailable() {
        let alice_id = UserId::new();
        let bob_id = UserId::new();
        let encrypted = encrypt("old", &keys_for(&[(bob_id, bob())])).unwrap();
        let bare = WrappedKeys::parse(&encrypted.encrypted_key)
            .key_for(&bob_id)
            .unwrap()
            .to_string();

        let mut envelope = envelope_from(RoomId::new(), alice_id, &encrypted);
        envelope.encrypted_key = bare;

        let result = decrypt(&envelope, &alice_id, alice());
        assert!(matches!(result, Err(CryptoError::SelfEncryptedUnavailable)));
    }

    #[test]
    fn legacy_key_from_partner_still_decrypts() {
        let (alice_id, bob_id) = (UserId::new(), UserId::new());
        let encrypted = encrypt("legacy hello", &keys_for(&[(bob_id, bob())])).unwrap();
        let bare = WrappedKeys::parse(&encrypted.encrypted_key)
            .key_for(&bob_id)
            .unwrap()
            .to_string();

        let mut envelope = envelope_from(RoomId::new(), alice_id, &encrypted);
        envelope.encrypted_key = bare;

        assert_eq!(decrypt(&envelope, &bob_id, bob()).unwrap(), "legacy hello");
    }

    #[test]
    fn corrupted_wrapped_key_fails_unwrap() {
        let bob_id = UserId::new();
        let encrypted = encrypt("x", &keys_for(&[(bob_id, bob())])).unwrap();
        let mut envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);
        let mut map = BTreeMap::new();
        map.insert(bob_id, STANDARD.encode([7u8; 256]));
        envelope.encrypted_key = serde_json::to_string(&map).unwrap();

        let result = decrypt(&envelope, &bob_id, bob());
        assert!(matches!(result, Err(CryptoError::KeyUnwrapFailed(_))));
    }

    #[test]
    fn non_base64_wrapped_key_fails_unwrap() {
        let bob_id = UserId::new();
        let encrypted = encrypt("x", &keys_for(&[(bob_id, bob())])).unwrap();
        let mut envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);
        envelope.encrypted_key = "!!not base64!!".into();

        let result = decrypt(&envelope, &bob_id, bob());
        assert!(matches!(result, Err(CryptoError::KeyUnwrapFailed(_))));
    }

    #[test]
    fn malformed_iv_is_reported() {
        let bob_id = UserId::new();
        let encrypted = encrypt("x", &keys_for(&[(bob_id, bob())])).unwrap();
        let mut envelope = envelope_from(RoomId::new(), UserId::new(), &encrypted);
        envelope.iv = STANDARD.encode([0u8; 8]);

        let result = decrypt(&envelope, &bob_id, bob());
        assert!(matches!(result, Err(CryptoError::MalformedEnvelope(_))));
    }

    #[test]
    fn encrypt_without_recipients_fails() {
        let result = encrypt("nobody", &RecipientKeys::new());
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }
}
