use axum::extract::{Path, State};
use axum::Json;
use sealtalk_shared::api::presence::PresenceResponse;
use sealtalk_shared::ids::UserId;

use crate::state::AppState;

/// PUT /api/presence/{user_id}: register one connection for the user.
pub async fn connect(State(state): State<AppState>, Path(user_id): Path<UserId>) -> Json<PresenceResponse> {
    state.presence.connect(user_id);
    Json(PresenceResponse {
        status: state.presence.status(&user_id),
    })
}

/// DELETE /api/presence/{user_id}: drop one connection for the user.
pub async fn disconnect(State(state): State<AppState>, Path(user_id): Path<UserId>) -> Json<PresenceResponse> {
    state.presence.disconnect(user_id);
    Json(PresenceResponse {
        status: state.presence.status(&user_id),
    })
}

/// GET /api/presence/{user_id}
pub async fn status(State(state): State<AppState>, Path(user_id): Path<UserId>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        status: state.presence.status(&user_id),
    })
}
