//! Facebook Messenger API client

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use relay_core::Config;

use crate::error::{FacebookError, Result};

/// Facebook Graph API base URL
pub const FACEBOOK_API_URL: &str = "https://graph.facebook.com/v15.0";

/// Longest text the Send API accepts in one message, in characters
pub const MAX_TEXT_LENGTH: usize = 2000;

/// Facebook API client
#[derive(Clone)]
pub struct FacebookApi {
    client: Client,
    graph_url: String,
    access_token: Option<String>,
    verify_token: String,
}

impl std::fmt::Debug for FacebookApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookApi")
            .field("graph_url", &self.graph_url)
            .field("has_access_token", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl FacebookApi {
    /// Create a new Facebook API client
    pub fn new(graph_url: &str, access_token: Option<&str>, verify_token: &str) -> Self {
        Self {
            client: Client::new(),
            graph_url: graph_url.trim_end_matches('/').to_string(),
            access_token: access_token.map(str::to_string),
            verify_token: verify_token.to_string(),
        }
    }

    /// Create a client from the relay configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| FacebookError::Request(e.to_string()))?;

        let facebook = &config.facebook;
        Ok(Self {
            client,
            graph_url: facebook.graph_url.trim_end_matches('/').to_string(),
            access_token: facebook.page_access_token.clone(),
            verify_token: facebook.verify_token.clone(),
        })
    }

    /// Send a text message to a user via the Send API.
    ///
    /// Every outcome is reported; callers decide whether delivery failures
    /// matter to them.
    pub async fn send_message(&self, recipient_id: &str, text: &str) -> Result<MessageResponse> {
        if recipient_id.is_empty() || text.is_empty() {
            return Err(FacebookError::EmptyMessage);
        }
        let access_token = self
            .access_token
            .as_deref()
            .ok_or(FacebookError::AccessTokenNotSet)?;

        let url = format!("{}/me/messages", self.graph_url);

        let payload = SendMessagePayload {
            messaging_type: "RESPONSE",
            recipient: Recipient { id: recipient_id },
            message: MessageText { text },
        };

        debug!("Sending message to {}: {}", recipient_id, text);

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", access_token)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| FacebookError::from(e.without_url()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!("Facebook API error: {} - {}", status, body);
            return Err(FacebookError::Api(format!("{} - {}", status, body)));
        }

        let message_response: MessageResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!("Unexpected Send API response body ({}): {}", e, body);
            MessageResponse::default()
        });
        info!("Message sent successfully: {:?}", message_response.message_id);

        Ok(message_response)
    }

    /// Verify webhook challenge for Facebook webhook setup
    pub fn verify_webhook(&self, mode: &str, token: &str, challenge: &str) -> Result<String> {
        if mode == "subscribe" && token == self.verify_token {
            info!("WEBHOOK_VERIFIED");
            Ok(challenge.to_string())
        } else {
            warn!("Webhook verification failed: invalid mode or token");
            Err(FacebookError::WebhookVerificationFailed)
        }
    }

    /// Parse an incoming webhook body.
    ///
    /// Only `page` bodies have their entries decoded; any other object comes
    /// back with no entries, whatever shape they had.
    pub fn parse_webhook(&self, payload: &[u8]) -> Result<WebhookPayload> {
        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| FacebookError::InvalidPayload(e.to_string()))?;

        let object = value.get("object").and_then(|o| o.as_str());
        if object != Some("page") {
            return Ok(WebhookPayload {
                object: object.map(str::to_string),
                entry: None,
            });
        }

        WebhookPayload::deserialize(value).map_err(|e| FacebookError::InvalidPayload(e.to_string()))
    }
}

// =============================================================================
// Data structures for Facebook Messenger API
// =============================================================================

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    messaging_type: &'static str,
    recipient: Recipient<'a>,
    message: MessageText<'a>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageText<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageResponse {
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
}

/// Top-level webhook body
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Option<Vec<WebhookEntry>>,
}

impl WebhookPayload {
    /// Whether the body is addressed to a page subscription
    pub fn is_page(&self) -> bool {
        self.object.as_deref() == Some("page")
    }

    pub fn entries(&self) -> &[WebhookEntry] {
        self.entry.as_deref().unwrap_or_default()
    }
}

/// One webhook entry. Messaging events stay raw until
/// [`WebhookEntry::events`] so a single malformed event cannot reject the
/// whole body.
#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Option<Vec<serde_json::Value>>,
}

impl WebhookEntry {
    /// Decode each messaging event independently, in order
    pub fn events(&self) -> impl Iterator<Item = serde_json::Result<WebhookMessaging>> + '_ {
        self.messaging
            .iter()
            .flatten()
            .map(|raw| WebhookMessaging::deserialize(raw))
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessaging {
    #[serde(default)]
    pub sender: Option<WebhookParticipant>,
    #[serde(default)]
    pub recipient: Option<WebhookParticipant>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<WebhookMessage>,
}

impl WebhookMessaging {
    /// Sender PSID, if present and non-empty
    pub fn sender_id(&self) -> Option<&str> {
        self.sender
            .as_ref()
            .and_then(|s| s.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookParticipant {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}
