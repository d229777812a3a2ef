use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sealtalk_shared::error::SealTalkError;

/// Newtype wrapper for `SealTalkError` that implements `IntoResponse`.
///
/// Orphan rule: neither the trait (`IntoResponse`)
/// nor the type (`SealTalkError`) is defined in this crate.
#[derive(Debug)]
pub struct ServerError(pub SealTalkError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            SealTalkError::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            SealTalkError::Unauthorized => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            SealTalkError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            SealTalkError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            SealTalkError::Crypto(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            SealTalkError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SealTalkError> for ServerError {
    fn from(e: SealTalkError) -> Self {
        ServerError(e)
    }
}
