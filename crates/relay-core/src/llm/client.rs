//! Gemini API HTTP Client

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

use super::types::*;

/// Sent to the user whenever a generated reply is unavailable
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't come up with a reply right now.";

/// Produces reply text for a prompt. Implementations never fail; they
/// degrade to a fallback string instead.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, prompt: &str) -> String;
}

/// Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client from configuration, or `None` when no API key is set
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(api_key) = config.llm.api_key.clone() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(Error::Http)?;

        Ok(Some(Self {
            client,
            api_key,
            model: config.llm.model.clone(),
            base_url: config.llm.base_url.trim_end_matches('/').to_string(),
        }))
    }

    /// Create with an explicit endpoint (for testing or custom gateways)
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for a completion of `prompt`
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!("Sending request to Gemini API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;

        // Error bodies usually carry a readable `error` object, so decode
        // them through the same path before giving up on the status alone.
        let parsed = serde_json::from_str::<GenerateResponse>(&body);

        if !status.is_success() {
            warn!("Gemini API error: {} - {}", status, body);
            return Err(match parsed.map(GenerateResponse::into_reply) {
                Ok(ReplyText::Refused(reason)) => Error::Llm(reason),
                _ => Error::Llm(format!("{}: {}", status, body)),
            });
        }

        let parsed = parsed.map_err(|e| Error::UnrecognizedResponse(format!("{} - {}", e, body)))?;

        match parsed.into_reply() {
            ReplyText::Text(text) => {
                info!("Gemini API response: {} chars", text.chars().count());
                Ok(text)
            }
            ReplyText::Empty => Err(Error::EmptyResponse),
            ReplyText::Refused(reason) => Err(Error::Llm(reason)),
        }
    }
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn reply(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Gemini reply unavailable, using fallback: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
