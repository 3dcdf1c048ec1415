//! Wire types for the three shapes the bridge handles.
//!
//! The client side speaks the OpenAI Chat Completions format. The upstream is
//! OpenAI-compatible too, but its assistant messages may carry a separate
//! `reasoning_content` field which the client-facing shape folds into
//! `content`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound (what clients send us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content is forwarded verbatim, whichever form the client used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

impl ChatMessage {
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream request (what we send TO the provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u64,
    pub stream: bool,
}

// ---------------------------------------------------------------------------
// Upstream response (what we receive FROM the provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub choices: Vec<UpstreamChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default)]
    pub index: u64,
    pub message: UpstreamMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default = "assistant_role")]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Intermediate reasoning emitted by reasoning models.
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Outbound response (what clients get back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: u64,
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

pub const AUTHENTICATION_ERROR: &str = "authentication_error";
pub const INVALID_REQUEST_ERROR: &str = "invalid_request_error";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: impl Into<String>, code: Option<u16>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.to_string(),
                code,
            },
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(AUTHENTICATION_ERROR, message, None)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST_ERROR, message, None)
    }

    pub fn upstream_failure(message: impl Into<String>, code: u16) -> Self {
        Self::new(INVALID_REQUEST_ERROR, message, Some(code))
    }
}

/// Shape of an upstream error body. Only the message is used; the rest of the
/// vendor's error object varies too much to type.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorResponse {
    pub error: UpstreamError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamError {
    #[serde(default)]
    pub message: Option<String>,
}
