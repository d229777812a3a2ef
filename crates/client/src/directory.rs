use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sealtalk_crypto::directory::KeyDirectory;
use sealtalk_crypto::error::CryptoError;
use sealtalk_shared::api::keys::{PublicKeyResponse, PublishKeyRequest};
use sealtalk_shared::ids::UserId;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Parse a user-safe error message from a non-success HTTP response.
async fn error_from_response(resp: reqwest::Response, context: &str) -> ClientError {
    #[derive(serde::Deserialize)]
    struct ServerError {
        error: String,
    }
    let status = resp.status().as_u16();
    match resp.json::<ServerError>().await {
        Ok(body) => ClientError::Server {
            status,
            message: body.error,
        },
        Err(_) => ClientError::Server {
            status,
            message: context.to_string(),
        },
    }
}

/// Key directory backed by the SealTalk server's `/api/users/{id}/public-key`.
#[derive(Debug, Clone)]
pub struct HttpKeyDirectory {
    api_base_url: String,
    http_client: Client,
}

impl HttpKeyDirectory {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: config.api_base_url.clone(),
            http_client,
        })
    }

    fn key_url(&self, user_id: &UserId) -> String {
        format!("{}/api/users/{user_id}/public-key", self.api_base_url)
    }

    pub async fn publish_key(&self, user_id: &UserId, public_key: &str) -> Result<PublicKeyResponse, ClientError> {
        let resp = self
            .http_client
            .put(self.key_url(user_id))
            .json(&PublishKeyRequest {
                public_key: public_key.to_string(),
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp, "public key publish failed").await);
        }
        Ok(resp.json().await?)
    }

    pub async fn fetch_key(&self, user_id: &UserId) -> Result<Option<PublicKeyResponse>, ClientError> {
        let resp = self.http_client.get(self.key_url(user_id)).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(error_from_response(resp, "public key lookup failed").await);
        }
        Ok(Some(resp.json().await?))
    }
}

#[async_trait]
impl KeyDirectory for HttpKeyDirectory {
    async fn publish(&self, user_id: &UserId, public_key_b64: &str) -> Result<(), CryptoError> {
        self.publish_key(user_id, public_key_b64)
            .await
            .map(|_| ())
            .map_err(|e| CryptoError::DirectoryPublishFailed(e.to_string()))
    }

    async fn lookup(&self, user_id: &UserId) -> Result<Option<String>, CryptoError> {
        self.fetch_key(user_id)
            .await
            .map(|record| record.map(|r| r.public_key))
            .map_err(|e| CryptoError::DirectoryLookupFailed(e.to_string()))
    }
}
