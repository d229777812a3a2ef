//! LocalKeyStore implementation for CryptoStore.

use rusqlite::OptionalExtension;

use crate::error::CryptoError;
use crate::identity::IdentityKeyPair;
use crate::storage::{unix_now, CryptoStore, LocalKeyStore};

const PUBLISHED_FINGERPRINT: &str = "published_key_fingerprint";
const PUBLISHED_AT: &str = "published_at";

impl LocalKeyStore for CryptoStore<'_> {
    fn load(&self) -> Result<Option<IdentityKeyPair>, CryptoError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT public_key, private_key FROM crypto_identity_keys WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((pub_bytes, mut priv_bytes)) => {
                let result = IdentityKeyPair::from_der(&pub_bytes, &priv_bytes);
                zeroize::Zeroize::zeroize(&mut priv_bytes);
                result.map(Some)
            }
            None => Ok(None),
        }
    }

    fn save(&self, keypair: &IdentityKeyPair) -> Result<(), CryptoError> {
        let public_der = keypair.public_key_der()?;
        let private_der = keypair.private_key_der()?;

        let tx = self.conn.unchecked_transaction()?;
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM crypto_identity_keys WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        if exists {
            return Err(CryptoError::StorageError("identity already exists".into()));
        }

        self.conn.execute(
            "INSERT INTO crypto_identity_keys (id, public_key, private_key, created_at)
             VALUES (1, ?1, ?2, ?3)",
            rusqlite::params![public_der, private_der.as_slice(), unix_now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CryptoError> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn
            .execute("DELETE FROM crypto_identity_keys WHERE id = 1", [])?;
        self.delete_config(PUBLISHED_FINGERPRINT)?;
        self.delete_config(PUBLISHED_AT)?;
        tx.commit()?;
        Ok(())
    }

    fn published_fingerprint(&self) -> Result<Option<String>, CryptoError> {
        self.get_config(PUBLISHED_FINGERPRINT)?
            .map(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| CryptoError::StorageError(format!("published fingerprint: {e}")))
            })
            .transpose()
    }

    fn mark_published(&self, fingerprint: &str) -> Result<(), CryptoError> {
        let tx = self.conn.unchecked_transaction()?;
        self.store_config(PUBLISHED_FINGERPRINT, fingerprint.as_bytes())?;
        self.store_config(PUBLISHED_AT, &unix_now().to_be_bytes())?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;
    use crate::test_support::{alice, bob};

    #[test]
    fn load_on_empty_store_is_none() {
        let conn = init_test_db();
        let store = CryptoStore::new(&conn);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let conn = init_test_db();
        let store = CryptoStore::new(&conn);
        store.save(alice()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.public_key(), alice().public_key());
        assert_eq!(loaded.fingerprint().unwrap(), alice().fingerprint().unwrap());
    }

    #[test]
    fn save_twice_refuses_to_overwrite() {
        let conn = init_test_db();
        let store = CryptoStore::new(&conn);
        store.save(alice()).unwrap();

        let result = store.save(bob());
        assert!(matches!(result, Err(CryptoError::StorageError(_))));
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.public_key(), alice().public_key());
    }

    #[test]
    fn clear_removes_identity_and_publish_marker() {
        let conn = init_test_db();
        let store = CryptoStore::new(&conn);
        store.save(alice()).unwrap();
        store.mark_published("abc").unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.published_fingerprint().unwrap().is_none());
    }

    #[test]
    fn clear_then_save_accepts_new_identity() {
        let conn = init_test_db();
        let store = CryptoStore::new(&conn);
        store.save(alice()).unwrap();
        store.clear().unwrap();
        store.save(bob()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().public_key(), bob().public_key());
    }

    #[test]
    fn mark_published_records_fingerprint() {
        let conn = init_test_db();
        let store = CryptoStore::new(&conn);
        assert!(store.published_fingerprint().unwrap().is_none());

        store.mark_published("deadbeef").unwrap();
        assert_eq!(store.published_fingerprint().unwrap().as_deref(), Some("deadbeef"));
        assert!(store.get_config(PUBLISHED_AT).unwrap().is_some());
    }

    #[test]
    fn corrupted_row_surfaces_invalid_key() {
        let conn = init_test_db();
        conn.execute(
            "INSERT INTO crypto_identity_keys (id, public_key, private_key, created_at) VALUES (1, X'AA', X'BB', 0)",
            [],
        )
        .unwrap();
        let store = CryptoStore::new(&conn);
        assert!(matches!(store.load(), Err(CryptoError::InvalidKey(_))));
    }
}
