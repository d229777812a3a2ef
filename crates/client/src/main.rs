use std::path::Path;

use tracing_subscriber::EnvFilter;

use sealtalk_client::chat::ChatSession;
use sealtalk_client::config::ClientConfig;
use sealtalk_crypto::error::CryptoError;
use sealtalk_crypto::vault::{generate_salt, unlock, VaultKey, VaultSource};
use sealtalk_shared::ids::UserId;

const USAGE: &str = "usage: sealtalk-client <user-id> [--regenerate]";

/// Keychain first; a passphrase from `SEALTALK_PASSPHRASE` when no keychain exists.
fn unlock_vault(user_id: &UserId, key_store_path: &Path) -> Result<VaultKey, Box<dyn std::error::Error>> {
    let account = user_id.to_string();
    match unlock(VaultSource::Keychain { account: &account }) {
        Ok(key) => Ok(key),
        Err(CryptoError::KeychainUnavailable) => {
            tracing::warn!("OS keychain unavailable, falling back to passphrase");
            let passphrase = std::env::var("SEALTALK_PASSPHRASE")
                .map_err(|_| "no keychain available and SEALTALK_PASSPHRASE is not set")?;

            let salt_path = key_store_path.with_extension("salt");
            let salt = match std::fs::read(&salt_path) {
                Ok(salt) => salt,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    let salt = generate_salt().to_vec();
                    std::fs::write(&salt_path, &salt)?;
                    salt
                }
                Err(e) => return Err(e.into()),
            };
            Ok(unlock(VaultSource::Passphrase {
                passphrase: &passphrase,
                salt: &salt,
            })?)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = ClientConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let user_id: UserId = args.next().ok_or(USAGE)?.parse()?;
    let regenerate = match args.next().as_deref() {
        None => false,
        Some("--regenerate") => true,
        Some(_) => return Err(USAGE.into()),
    };

    let vault = unlock_vault(&user_id, &config.key_store_path)?;
    let mut session = ChatSession::connect(&config, user_id, &vault).await?;
    if regenerate {
        session.regenerate_identity().await?;
    }

    println!("user:        {}", session.user_id());
    println!("key state:   {:?}", session.key_state());
    match session.fingerprint()? {
        Some(fingerprint) => println!("fingerprint: {fingerprint}"),
        None => println!("fingerprint: (no identity)"),
    }

    Ok(())
}
