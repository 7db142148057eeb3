//! Error types for relay-facebook

use thiserror::Error;

/// relay-facebook error type
#[derive(Error, Debug)]
pub enum FacebookError {
    #[error("Facebook page access token not set")]
    AccessTokenNotSet,

    #[error("Facebook API error: {0}")]
    Api(String),

    #[error("Facebook API request failed: {0}")]
    Request(String),

    #[error("Facebook webhook verification failed")]
    WebhookVerificationFailed,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Refusing to send an empty message")]
    EmptyMessage,

    #[error("JSON serialization error: {0}")]
    Serialization(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Core error: {0}")]
    Core(#[from] relay_core::Error),
}

impl From<reqwest::Error> for FacebookError {
    fn from(err: reqwest::Error) -> Self {
        FacebookError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for FacebookError {
    fn from(err: serde_json::Error) -> Self {
        FacebookError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FacebookError>;
