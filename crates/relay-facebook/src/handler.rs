//! Message handler for Facebook Messenger

use std::sync::Arc;
use tracing::{debug, error, info};

use relay_core::{Config, GeminiClient, ReplyGenerator};

use crate::api::{FacebookApi, MAX_TEXT_LENGTH, WebhookMessaging, WebhookPayload};
use crate::error::Result;

/// Normalized text that starts an AI conversation
pub const TRIGGER_PHRASE: &str = "start chat";

/// Acknowledgement sent as soon as the trigger phrase arrives
pub const START_ACK: &str = "Starting chat...";

/// Prompt sent to the generator after the trigger phrase
pub const GREETING_PROMPT: &str =
    "The user said 'start chat'. Greet them and ask how you can help.";

/// Sent instead of a generated greeting when no Gemini key is configured
pub const NOT_CONFIGURED_NOTICE: &str =
    "Gemini API not configured. Add GEMINI_API_KEY to enable AI replies.";

/// Prefix for echoed messages
pub const ECHO_PREFIX: &str = "I got: ";

/// What an incoming text asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartChat,
    /// Echo the original, un-normalized text
    Echo(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        if text.trim().to_lowercase() == TRIGGER_PHRASE {
            Self::StartChat
        } else {
            Self::Echo(text.to_string())
        }
    }
}

/// Why an event produced no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event could not be decoded
    Malformed,
    MissingSender,
    /// Not a message, or a message without text
    NoText,
    /// A copy of a message the page sent itself
    PageEcho,
}

/// Result of handling one messaging event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Skipped(SkipReason),
    /// Replies were attempted; counts are per Send API request
    Replied { delivered: usize, failed: usize },
}

/// Facebook message handler
pub struct MessageHandler {
    api: FacebookApi,
    generator: Option<Arc<dyn ReplyGenerator>>,
}

impl MessageHandler {
    /// Create a new handler. Without a generator the trigger phrase gets the
    /// "not configured" notice.
    pub fn new(api: FacebookApi, generator: Option<Arc<dyn ReplyGenerator>>) -> Self {
        Self { api, generator }
    }

    /// Build the Send API client and, when a key is configured, the Gemini
    /// client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = FacebookApi::from_config(config)?;
        let generator = GeminiClient::from_config(config)?
            .map(|client| Arc::new(client) as Arc<dyn ReplyGenerator>);

        Ok(Self::new(api, generator))
    }

    pub fn api(&self) -> &FacebookApi {
        &self.api
    }

    /// Whether AI replies are enabled
    pub fn ai_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Handle every messaging event in a page payload, sequentially and in
    /// order. A failing event never stops the ones after it.
    pub async fn process_payload(&self, payload: &WebhookPayload) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();

        for entry in payload.entries() {
            for event in entry.events() {
                let outcome = match event {
                    Ok(event) => self.handle_event(&event).await,
                    Err(e) => {
                        debug!("Skipping malformed messaging event: {}", e);
                        EventOutcome::Skipped(SkipReason::Malformed)
                    }
                };
                outcomes.push(outcome);
            }
        }

        outcomes
    }

    /// Handle a single messaging event
    pub async fn handle_event(&self, messaging: &WebhookMessaging) -> EventOutcome {
        let Some(sender_id) = messaging.sender_id() else {
            debug!("Ignoring event without sender ID");
            return EventOutcome::Skipped(SkipReason::MissingSender);
        };

        let Some(message) = &messaging.message else {
            debug!("Ignoring non-message event");
            return EventOutcome::Skipped(SkipReason::NoText);
        };

        if message.is_echo {
            debug!("Ignoring echo of page message {:?}", message.mid);
            return EventOutcome::Skipped(SkipReason::PageEcho);
        }

        let text = match message.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => {
                debug!("Ignoring message without text");
                return EventOutcome::Skipped(SkipReason::NoText);
            }
        };

        info!("Message from {}: {}", sender_id, text.trim().to_lowercase());

        let mut delivery = Delivery::default();

        match Command::parse(text) {
            Command::StartChat => {
                self.send_text(sender_id, START_ACK, &mut delivery).await;

                match &self.generator {
                    Some(generator) => {
                        let reply = generator.reply(GREETING_PROMPT).await;
                        self.send_text(sender_id, &reply, &mut delivery).await;
                    }
                    None => {
                        self.send_text(sender_id, NOT_CONFIGURED_NOTICE, &mut delivery)
                            .await;
                    }
                }
            }
            Command::Echo(original) => {
                let reply = format!("{}{}", ECHO_PREFIX, original);
                self.send_text(sender_id, &reply, &mut delivery).await;
            }
        }

        EventOutcome::Replied {
            delivered: delivery.delivered,
            failed: delivery.failed,
        }
    }

    /// Send `text`, split to the Send API length limit. Failures are logged
    /// and counted, never returned.
    async fn send_text(&self, recipient_id: &str, text: &str, delivery: &mut Delivery) {
        for chunk in split_message(text, MAX_TEXT_LENGTH) {
            match self.api.send_message(recipient_id, &chunk).await {
                Ok(_) => delivery.delivered += 1,
                Err(e) => {
                    error!("Send API request to {} failed: {}", recipient_id, e);
                    delivery.failed += 1;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Delivery {
    delivered: usize,
    failed: usize,
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// paragraph, line, sentence and then word boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let limit = match remaining.char_indices().nth(max_chars) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..limit];
        let cut = window
            .rfind("\n\n")
            .map(|i| i + 2)
            .or_else(|| window.rfind('\n').map(|i| i + 1))
            .or_else(|| window.rfind(". ").map(|i| i + 2))
            .or_else(|| window.rfind(' ').map(|i| i + 1))
            .unwrap_or(limit);

        chunks.push(remaining[..cut].trim_end().to_string());
        remaining = remaining[cut..].trim_start();
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}
