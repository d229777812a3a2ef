/// Shared error type used across server and client.
#[derive(Debug, thiserror::Error)]
pub enum SealTalkError {
    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = SealTalkError::NotFound;
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn validation_contains_message() {
        let err = SealTalkError::Validation("bad input".into());
        assert_eq!(err.to_string(), "validation error: bad input");
    }

    #[test]
    fn crypto_contains_message() {
        let err = SealTalkError::Crypto("recipient key unavailable".into());
        assert_eq!(err.to_string(), "crypto error: recipient key unavailable");
    }

    #[test]
    fn all_variants_impl_error() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(SealTalkError::NotFound),
            Box::new(SealTalkError::Unauthorized),
            Box::new(SealTalkError::Validation("x".into())),
            Box::new(SealTalkError::Internal("y".into())),
            Box::new(SealTalkError::Crypto("z".into())),
            Box::new(SealTalkError::ServiceUnavailable("directory down".into())),
        ];
        for e in &errors {
            let _ = e.to_string();
        }
    }

    #[test]
    fn service_unavailable_display() {
        let err = SealTalkError::ServiceUnavailable("directory down".into());
        assert_eq!(err.to_string(), "service unavailable: directory down");
    }
}
