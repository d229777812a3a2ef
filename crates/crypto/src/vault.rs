//! At-rest protection for the local key store.
//!
//! The key store database is SQLCipher-encrypted under a key derived (HKDF-SHA256)
//! from a 32-byte vault key. The vault key comes from the OS keychain, scoped
//! to the user, or from a passphrase via Argon2id when no keychain is available.

use std::path::Path;

use hkdf::Hkdf;
use rand::RngCore;
use rusqlite::Connection;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::storage::migrations::run_crypto_migrations;

pub const KEYCHAIN_SERVICE: &str = "com.sealtalk.keystore";
const STORE_KEY_INFO: &[u8] = b"sealtalk-keystore-encryption-v1";
const MIN_SALT_LEN: usize = 16;

/// Where the vault key comes from.
#[derive(Debug, Clone, Copy)]
pub enum VaultSource<'a> {
    /// OS keychain entry under [`KEYCHAIN_SERVICE`]; created on first use.
    Keychain { account: &'a str },
    /// Argon2id over a user passphrase.
    Passphrase { passphrase: &'a str, salt: &'a [u8] },
}

/// 32-byte vault key, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; 32],
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKey").field("key", &"[REDACTED]").finish()
    }
}

impl VaultKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// SQLCipher raw-key literal (`x'<64 hex>'`), wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct StoreKey {
    literal: String,
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreKey").field("literal", &"[REDACTED]").finish()
    }
}

impl StoreKey {
    pub fn as_pragma_value(&self) -> &str {
        &self.literal
    }
}

pub fn unlock(source: VaultSource<'_>) -> Result<VaultKey, CryptoError> {
    match source {
        VaultSource::Keychain { account } => from_keychain(account),
        VaultSource::Passphrase { passphrase, salt } => from_passphrase(passphrase, salt),
    }
}

fn from_keychain(account: &str) -> Result<VaultKey, CryptoError> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, account)
        .map_err(|_| CryptoError::KeychainUnavailable)?;

    match entry.get_password() {
        Ok(mut stored) => {
            let decoded = hex_decode(&stored);
            stored.zeroize();
            let mut bytes = decoded
                .ok_or_else(|| CryptoError::KeychainError("malformed vault key in keychain".into()))?;
            let key: Result<[u8; 32], _> = bytes.as_slice().try_into();
            bytes.zeroize();
            key.map(|key| VaultKey { key })
                .map_err(|_| CryptoError::KeychainError("malformed vault key in keychain".into()))
        }
        Err(keyring::Error::NoEntry) => {
            let mut key = [0u8; 32];
            rand::rng().fill_bytes(&mut key);
            let mut encoded = hex_encode(&key);
            let stored = entry.set_password(&encoded);
            encoded.zeroize();
            stored?;
            tracing::info!(account, "created vault key in keychain");
            Ok(VaultKey { key })
        }
        Err(e) => Err(CryptoError::from(e)),
    }
}

fn from_passphrase(passphrase: &str, salt: &[u8]) -> Result<VaultKey, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::InvalidKey("salt too short".into()));
    }

    let params = argon2::Params::new(65536, 3, 4, Some(32))
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(VaultKey { key })
}

/// Random salt for [`VaultSource::Passphrase`].
pub fn generate_salt() -> [u8; MIN_SALT_LEN] {
    let mut salt = [0u8; MIN_SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

pub fn derive_store_key(vault: &VaultKey) -> Result<StoreKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, vault.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(STORE_KEY_INFO, &mut okm)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let mut hex = hex_encode(&okm);
    okm.zeroize();
    let key = StoreKey {
        literal: format!("x'{hex}'"),
    };
    hex.zeroize();
    Ok(key)
}

/// Key an open connection and confirm the key actually decrypts it.
pub fn apply_store_key(conn: &Connection, key: &StoreKey) -> Result<(), CryptoError> {
    // The x'..' literal must be inlined: bound as a parameter SQLCipher would
    // treat it as a passphrase and run its own KDF over it.
    conn.execute_batch(&format!("PRAGMA key = \"{}\";", key.as_pragma_value()))?;

    let cipher_version: String = conn
        .pragma_query_value(None, "cipher_version", |row| row.get(0))
        .map_err(|_| CryptoError::StorageError("SQLCipher not available".into()))?;
    if cipher_version.is_empty() {
        return Err(CryptoError::StorageError("SQLCipher not available".into()));
    }

    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|_| CryptoError::StorageError("key store cannot be decrypted with this vault key".into()))?;
    Ok(())
}

/// Open (creating if needed) the key store at `path`, keyed and migrated.
pub fn open_key_store(path: &Path, vault: &VaultKey) -> Result<Connection, CryptoError> {
    let conn = Connection::open(path)?;
    apply_store_key(&conn, &derive_store_key(vault)?)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    run_crypto_migrations(&conn)?;
    tracing::debug!(path = %path.display(), "opened key store");
    Ok(conn)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CryptoStore, LocalKeyStore};
    use crate::test_support::alice;

    fn passphrase_key(passphrase: &str, salt: &[u8]) -> VaultKey {
        unlock(VaultSource::Passphrase { passphrase, salt }).unwrap()
    }

    #[test]
    fn same_passphrase_same_salt_produces_same_key() {
        let a = passphrase_key("same-pass", &[1u8; 16]);
        let b = passphrase_key("same-pass", &[1u8; 16]);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn different_passphrase_or_salt_produces_different_key() {
        let base = passphrase_key("pass-a", &[2u8; 16]);
        assert_ne!(base.as_bytes(), passphrase_key("pass-b", &[2u8; 16]).as_bytes());
        assert_ne!(base.as_bytes(), passphrase_key("pass-a", &[3u8; 16]).as_bytes());
    }

    #[test]
    fn salt_too_short_returns_error() {
        let result = unlock(VaultSource::Passphrase {
            passphrase: "pass",
            salt: &[0u8; 8],
        });
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn store_key_is_a_67_char_hex_literal() {
        let key = derive_store_key(&passphrase_key("fmt", &[4u8; 16])).unwrap();
        let val = key.as_pragma_value();
        assert!(val.starts_with("x'") && val.ends_with('\''));
        // x'<64 hex chars>'
        assert_eq!(val.len(), 67);
    }

    #[test]
    fn store_key_derivation_is_deterministic() {
        let a = derive_store_key(&passphrase_key("det", &[5u8; 16])).unwrap();
        let b = derive_store_key(&passphrase_key("det", &[5u8; 16])).unwrap();
        assert_eq!(a.as_pragma_value(), b.as_pragma_value());
    }

    #[test]
    fn key_store_survives_reopen_with_same_vault_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let salt = [6u8; 16];

        {
            let conn = open_key_store(&path, &passphrase_key("reopen", &salt)).unwrap();
            CryptoStore::new(&conn).save(alice()).unwrap();
        }

        let conn = open_key_store(&path, &passphrase_key("reopen", &salt)).unwrap();
        let loaded = CryptoStore::new(&conn).load().unwrap().unwrap();
        assert_eq!(loaded.public_key(), alice().public_key());
    }

    #[test]
    fn wrong_vault_key_cannot_open_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");

        {
            let conn = open_key_store(&path, &passphrase_key("right", &[7u8; 16])).unwrap();
            CryptoStore::new(&conn).save(alice()).unwrap();
        }

        let result = open_key_store(&path, &passphrase_key("wrong", &[7u8; 16]));
        assert!(matches!(result, Err(CryptoError::StorageError(_))));
    }

    #[test]
    fn debug_output_is_redacted() {
        let vault = passphrase_key("debug", &[8u8; 16]);
        assert!(format!("{vault:?}").contains("REDACTED"));
        let store_key = derive_store_key(&vault).unwrap();
        assert!(format!("{store_key:?}").contains("REDACTED"));
    }

    #[test]
    fn hex_round_trip() {
        let bytes = [0x00, 0x7f, 0xff, 0x10];
        assert_eq!(hex_encode(&bytes), "007fff10");
        assert_eq!(hex_decode("007fff10").unwrap(), bytes);
        assert!(hex_decode("abc").is_none());
        assert!(hex_decode("zz").is_none());
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
