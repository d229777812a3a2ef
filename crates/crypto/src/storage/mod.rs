//! SQLCipher-backed local key store.
//!
//! One database per user-device. Callers open the connection and apply the
//! vault key (see [`crate::vault`]) before handing it to [`CryptoStore`].

pub mod identity_store;
pub mod migrations;

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use crate::error::CryptoError;
use crate::identity::IdentityKeyPair;

/// Durable, user-scoped storage for identity key material.
///
/// Implementations must survive process restart and are never synchronised
/// across devices.
pub trait LocalKeyStore {
    /// The stored identity, or `None` when no keypair exists yet.
    fn load(&self) -> Result<Option<IdentityKeyPair>, CryptoError>;

    /// Persist a new identity. Fails if one is already stored; callers that
    /// really mean to replace it must `clear` first.
    fn save(&self, keypair: &IdentityKeyPair) -> Result<(), CryptoError>;

    /// Delete the stored identity and its publish bookkeeping.
    fn clear(&self) -> Result<(), CryptoError>;

    /// Fingerprint of the public key last published successfully.
    fn published_fingerprint(&self) -> Result<Option<String>, CryptoError>;

    /// Record a successful publish of the key with `fingerprint`.
    fn mark_published(&self, fingerprint: &str) -> Result<(), CryptoError>;
}

/// Thin handle over a migrated connection.
pub struct CryptoStore<'a> {
    pub(crate) conn: &'a Connection,
}

impl<'a> CryptoStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn run_migrations(&self) -> Result<(), CryptoError> {
        migrations::run_crypto_migrations(self.conn)
    }

    pub fn store_config(&self, key: &str, value: &[u8]) -> Result<(), CryptoError> {
        self.conn.execute(
            "INSERT INTO crypto_config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<Vec<u8>>, CryptoError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM crypto_config WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn delete_config(&self, key: &str) -> Result<(), CryptoError> {
        self.conn
            .execute("DELETE FROM crypto_config WHERE key = ?1", [key])?;
        Ok(())
    }
}

fn lock_store(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, CryptoError> {
    conn.lock()
        .map_err(|_| CryptoError::StorageError("key store lock poisoned".into()))
}

/// Key store shared behind a mutex, for callers that hold it across await points.
impl LocalKeyStore for Mutex<Connection> {
    fn load(&self) -> Result<Option<IdentityKeyPair>, CryptoError> {
        CryptoStore::new(&*lock_store(self)?).load()
    }

    fn save(&self, keypair: &IdentityKeyPair) -> Result<(), CryptoError> {
        CryptoStore::new(&*lock_store(self)?).save(keypair)
    }

    fn clear(&self) -> Result<(), CryptoError> {
        CryptoStore::new(&*lock_store(self)?).clear()
    }

    fn published_fingerprint(&self) -> Result<Option<String>, CryptoError> {
        CryptoStore::new(&*lock_store(self)?).published_fingerprint()
    }

    fn mark_published(&self, fingerprint: &str) -> Result<(), CryptoError> {
        CryptoStore::new(&*lock_store(self)?).mark_published(fingerprint)
    }
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Create an in-memory SQLCipher database with migrations applied.
#[cfg(test)]
pub(crate) fn init_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "PRAGMA key = \"x'0000000000000000000000000000000000000000000000000000000000000000'\";",
    )
    .unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    migrations::run_crypto_migrations(&conn).unwrap();
    conn
}
