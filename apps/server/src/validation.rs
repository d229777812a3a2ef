use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sealtalk_shared::constants::MAX_PUBLIC_KEY_LENGTH;
use sealtalk_shared::error::SealTalkError;

use crate::error::ServerError;

/// Validate and normalize a published public key.
///
/// Trims whitespace, rejects empty strings, strings longer than
/// `MAX_PUBLIC_KEY_LENGTH`, and anything that is not standard base64. The
/// key itself is not parsed; the directory stores what clients publish.
pub fn validate_public_key(key: &str) -> Result<String, ServerError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(SealTalkError::Validation("publicKey is required".into()).into());
    }
    if trimmed.len() > MAX_PUBLIC_KEY_LENGTH {
        return Err(SealTalkError::Validation(format!(
            "publicKey must be {MAX_PUBLIC_KEY_LENGTH} characters or fewer"
        ))
        .into());
    }
    if STANDARD.decode(trimmed).is_err() {
        return Err(SealTalkError::Validation("publicKey must be base64".into()).into());
    }
    Ok(trimmed.to_string())
}
