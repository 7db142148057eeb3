//! relay-core: Messenger Relay Core Library
//!
//! Configuration, the shared error type and the generative-text client
//! used by the webhook relay.

pub mod config;
pub mod error;
pub mod llm;

pub use config::{Config, FacebookConfig, LlmConfig, ServerConfig};
pub use error::{Error, Result};
pub use llm::{FALLBACK_REPLY, GeminiClient, ReplyGenerator};
