//! Error types for relay-core

use thiserror::Error;

/// Main error type for relay-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gemini API error: {0}")]
    Llm(String),

    #[error("Unrecognized Gemini response: {0}")]
    UnrecognizedResponse(String),

    #[error("Gemini returned no text")]
    EmptyResponse,
}

/// Result type alias for relay-core
pub type Result<T> = std::result::Result<T, Error>;
