//! Gemini API types

use serde::{Deserialize, Serialize};

/// `generateContent` request body
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// Single-turn request carrying one user prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
        }
    }
}

/// A turn of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A content part. Non-text parts (inline data, function calls) decode with
/// `text: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    /// Text parts of this candidate joined together, if any are non-empty
    pub fn text(&self) -> Option<String> {
        let text = self
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        (!text.trim().is_empty()).then_some(text)
    }
}

/// OpenAI-compatible `choices[]` entry, returned by some Gemini proxies
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    pub block_reason: Option<String>,
}

/// Every response shape the client knows how to read.
///
/// Variants are tried in declaration order; the first one that fits wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Candidates {
        candidates: Vec<Candidate>,
    },
    Choices {
        choices: Vec<Choice>,
    },
    Text {
        #[serde(alias = "output_text")]
        text: String,
    },
    Error {
        error: ApiErrorBody,
    },
    Blocked {
        #[serde(rename = "promptFeedback")]
        prompt_feedback: PromptFeedback,
    },
}

/// What a decoded response amounts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyText {
    /// Usable text
    Text(String),
    /// A known shape that carried no text
    Empty,
    /// The provider reported an error or refused the prompt
    Refused(String),
}

impl GenerateResponse {
    /// Reduce the response to the first available text
    pub fn into_reply(self) -> ReplyText {
        match self {
            Self::Candidates { candidates } => candidates
                .iter()
                .find_map(Candidate::text)
                .map(ReplyText::Text)
                .unwrap_or(ReplyText::Empty),
            Self::Choices { choices } => choices
                .into_iter()
                .filter_map(|c| c.message.content)
                .find(|c| !c.trim().is_empty())
                .map(ReplyText::Text)
                .unwrap_or(ReplyText::Empty),
            Self::Text { text } if !text.trim().is_empty() => ReplyText::Text(text),
            Self::Text { .. } => ReplyText::Empty,
            Self::Error { error } => ReplyText::Refused(match (error.code, error.status) {
                (Some(code), Some(status)) => format!("{} {}: {}", code, status, error.message),
                (Some(code), None) => format!("{}: {}", code, error.message),
                (None, Some(status)) => format!("{}: {}", status, error.message),
                (None, None) => error.message,
            }),
            Self::Blocked { prompt_feedback } => ReplyText::Refused(format!(
                "prompt blocked: {}",
                prompt_feedback
                    .block_reason
                    .unwrap_or_else(|| "unspecified".to_string())
            )),
        }
    }
}
