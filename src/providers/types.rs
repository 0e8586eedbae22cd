// Unified request/response types for the provider adapters
//
// Each provider implementation transforms these into its own wire format.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ProviderError;
use crate::media::TransportPayload;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One part of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text { text: String },
    Image { source: TransportPayload },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(source: TransportPayload) -> Self {
        ContentBlock::Image { source }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, ContentBlock::Image { .. })
    }
}

/// A message in provider-neutral form.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn with_content(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| b.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_image(&self) -> bool {
        self.content.iter().any(|b| b.is_image())
    }
}

/// Provider-neutral request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Conversation messages, oldest first; the last one is the new turn.
    pub messages: Vec<Message>,

    /// Model name (empty = provider default)
    pub model: String,

    pub max_tokens: u32,

    /// System instruction (sent as `systemInstruction` for Gemini, prepended
    /// as a `{"role":"system"}` message for OpenAI-compatible providers)
    pub system: Option<String>,

    pub temperature: Option<f32>,

    /// Whether to stream the response
    pub stream: bool,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: String::new(),
            max_tokens: 2048,
            system: None,
            temperature: None,
            stream: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Number of image parts across all messages.
    pub fn image_count(&self) -> usize {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter(|b| b.is_image())
            .count()
    }
}

/// Complete (non-streamed) reply.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub id: String,
    pub model: String,
    pub text: String,
    pub stop_reason: Option<String>,
    pub provider: String,
}

/// Streaming chunk
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text
    TextDelta(String),
    /// Provider signalled the end of generation
    Done { stop_reason: Option<String> },
}

/// Lazy, finite, single-pass sequence of reply fragments.
pub type ReplyStream = mpsc::Receiver<Result<StreamChunk, ProviderError>>;
