use std::time::Duration;

#[doc(inline)]
pub use reqwest::StatusCode;

/// An error that prevented measurements or an annotation from being delivered.
///
/// Delivery errors never propagate to callers of the client. They are logged and published as
/// [`ClientEvent::Error`](crate::ClientEvent::Error).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Email or token are missing from the configuration.
    #[error("metrics disabled: no email or token provided")]
    NoCredentials,
    /// The client was used before [`Librato::init`](crate::Librato::init).
    #[error("client used before initialization")]
    NotInitialized,
    /// The request could not be sent or the response could not be read.
    #[error("could not send request")]
    Request(#[from] reqwest::Error),
    /// The backend responded with an unsuccessful status code.
    #[error("request failed with status {0}")]
    Status(StatusCode),
    /// All attempts together exceeded the request deadline.
    #[error("request did not complete within {0:?}")]
    Timeout(Duration),
    /// The request body could not be serialized.
    #[error("failed to serialize request body")]
    Json(#[from] serde_json::Error),
}

impl SendError {
    /// Returns `true` if a later attempt of the same request may succeed.
    ///
    /// This covers network errors, timeouts and server errors. Client errors are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(error) => error.is_connect() || error.is_timeout() || error.is_request(),
            Self::Status(status) => status.is_server_error(),
            Self::Timeout(_) => true,
            Self::NoCredentials | Self::NotInitialized | Self::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryable() {
        assert!(SendError::Status(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(SendError::Status(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(!SendError::Status(StatusCode::BAD_REQUEST).is_retryable());
        assert!(!SendError::Status(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(!SendError::NoCredentials.is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SendError::Status(StatusCode::FORBIDDEN).to_string(),
            "request failed with status 403 Forbidden"
        );
    }
}
