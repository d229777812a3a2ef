use crate::ids::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to publish (or overwrite) the caller's public identity key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishKeyRequest {
    /// Base64 of the SPKI DER encoding.
    pub public_key: String,
}

/// Current directory record for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub user_id: UserId,
    pub public_key: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_request_uses_public_key_field() {
        let req = PublishKeyRequest {
            public_key: "TUlJQg==".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["publicKey"], "TUlJQg==");
    }

    #[test]
    fn public_key_response_roundtrip() {
        let resp = PublicKeyResponse {
            user_id: UserId::new(),
            public_key: "TUlJQg==".into(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: PublicKeyResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }
}
