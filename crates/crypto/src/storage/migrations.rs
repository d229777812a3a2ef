//! Crypto migration runner, tracked in its own `_crypto_migrations` table.

use crate::error::CryptoError;
use rusqlite::Connection;

const MIGRATIONS: &[(i32, &str)] = &[(1, MIGRATION_001)];

const MIGRATION_001: &str = "
CREATE TABLE IF NOT EXISTS crypto_identity_keys (
    id          INTEGER PRIMARY KEY CHECK (id = 1),
    public_key  BLOB NOT NULL,
    private_key BLOB NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS crypto_config (
    key   TEXT PRIMARY KEY,
    value BLOB NOT NULL
);
";

pub fn run_crypto_migrations(conn: &Connection) -> Result<(), CryptoError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _crypto_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _crypto_migrations",
        [],
        |row| row.get(0),
    )?;

    for &(version, sql) in MIGRATIONS {
        if version > current_version {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO _crypto_migrations (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied crypto migration");
        }
    }

    Ok(())
}
