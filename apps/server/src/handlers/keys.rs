use axum::extract::{Path, State};
use axum::Json;
use sealtalk_shared::api::keys::{PublicKeyResponse, PublishKeyRequest};
use sealtalk_shared::error::SealTalkError;
use sealtalk_shared::ids::UserId;

use crate::error::ServerError;
use crate::state::AppState;
use crate::validation::validate_public_key;

/// PUT /api/users/{user_id}/public-key: publish (overwrite) a user's key.
pub async fn put_public_key(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<PublishKeyRequest>,
) -> Result<Json<PublicKeyResponse>, ServerError> {
    let public_key = validate_public_key(&req.public_key)?;
    let (record, rotated) = state.directory.publish(user_id, public_key);
    if rotated {
        // Envelopes wrapped to the previous key are unreadable on the new device.
        tracing::info!(user_id = %user_id, "public key rotated");
    } else {
        tracing::debug!(user_id = %user_id, "public key published");
    }
    Ok(Json(record))
}

/// GET /api/users/{user_id}/public-key: current key, 404 if never published.
pub async fn get_public_key(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<PublicKeyResponse>, ServerError> {
    state
        .directory
        .lookup(&user_id)
        .map(Json)
        .ok_or(ServerError(SealTalkError::NotFound))
}
