use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// GET /health/live: returns 200 unconditionally.
/// Used by load balancers to check if the process is alive.
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /health/ready: reports directory and presence table sizes.
/// Both tables are in-process, so a responding server is ready.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "publishedKeys": state.directory.len(),
        "onlineUsers": state.presence.online_count(),
    }))
}
