use sealtalk_crypto::error::CryptoError;
use sealtalk_shared::error::SealTalkError;
use sealtalk_shared::ids::RoomId;

/// Errors surfaced to the user by the chat client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("request timed out")]
    Timeout,

    #[error("could not connect to server")]
    Connect,

    #[error("network request failed")]
    Network,

    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    #[error("message is empty")]
    EmptyMessage,

    #[error("message is {size} bytes, limit is {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("{0:?} is not an attachment type")]
    NotAnAttachment(sealtalk_shared::api::message::MessageType),

    #[error("room {0} has not been opened")]
    RoomNotOpen(RoomId),

    #[error("client state lock poisoned")]
    LockPoisoned,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_connect() {
            ClientError::Connect
        } else {
            ClientError::Network
        }
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(e: rusqlite::Error) -> Self {
        ClientError::Crypto(CryptoError::from(e))
    }
}

impl From<ClientError> for SealTalkError {
    fn from(e: ClientError) -> Self {
        let message = e.to_string();
        match e {
            ClientError::Crypto(inner) => inner.into(),
            ClientError::EmptyMessage
            | ClientError::MessageTooLarge { .. }
            | ClientError::NotAnAttachment(_) => {
                SealTalkError::Validation(message)
            }
            ClientError::Timeout | ClientError::Connect | ClientError::Network => {
                SealTalkError::ServiceUnavailable(message)
            }
            _ => SealTalkError::Internal(message),
        }
    }
}
