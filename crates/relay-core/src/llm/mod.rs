//! Generative-text client and types
//!
//! Talks to the Gemini `generateContent` endpoint. Replies that cannot be
//! produced degrade to [`FALLBACK_REPLY`] instead of surfacing an error.

mod client;
mod types;

pub use client::{FALLBACK_REPLY, GeminiClient, ReplyGenerator};
pub use types::*;
