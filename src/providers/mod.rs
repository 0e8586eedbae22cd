// Multi-provider LLM support
//
// This module provides an abstraction layer over the hosted chat APIs the
// tutor can talk to (Gemini, Groq and other OpenAI-compatible endpoints),
// so the session controller drives every provider through one interface.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod factory;
pub mod gemini;
pub mod openai;
pub mod retry;
pub mod sse;
pub mod types;

pub use factory::create_provider_from_entry;
pub use retry::{with_retry, RetryPolicy};
pub use types::{
    ContentBlock, Message, ProviderRequest, ProviderResponse, ReplyStream, Role, StreamChunk,
};

use crate::media::TransportEncoding;

/// Errors raised by provider adapters.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("could not parse provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Auth(format!("{} rejected the API key ({})", provider, status)),
            429 => ProviderError::RateLimited,
            _ => ProviderError::Api {
                provider: provider.to_string(),
                status,
                body,
            },
        }
    }

    /// Worth retrying: network trouble, throttling or a server-side failure.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::RateLimited => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.without_url().to_string())
    }
}

/// Whether the provider keeps conversation history for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// A chat handle retains prior exchanges (images included); each call
    /// adds only the new turn to it.
    Stateful,
    /// Every call resends the system instruction and the text-only history.
    Stateless,
}

/// An open multi-turn chat with a stateful provider.
///
/// Created by [`LlmProvider::initialize`], owned by exactly one tutor
/// session, and dropped on reset.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    id: Uuid,
    system_instruction: String,
    history: Vec<Message>,
}

impl ChatHandle {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            system_instruction: system_instruction.into(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Exchanges recorded so far, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Request carrying the retained history plus `turn`.
    pub fn request_for(&self, turn: Message) -> ProviderRequest {
        let mut messages = self.history.clone();
        messages.push(turn);
        ProviderRequest::new(messages).with_system(self.system_instruction.clone())
    }

    /// Remember a completed exchange. Failed calls are never recorded.
    pub fn record_exchange(&mut self, turn: Message, reply: impl Into<String>) {
        self.history.push(turn);
        self.history.push(Message::assistant(reply));
    }
}

/// Trait for LLM providers
///
/// All adapters (Gemini, Groq, OpenAI-compatible) implement this trait,
/// providing a unified interface for opening a chat and sending turns.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request and wait for the complete response.
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and stream the response.
    ///
    /// The returned channel yields text deltas and closes when the reply is
    /// complete.
    async fn send_message_stream(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError>;

    /// Provider name (e.g. "gemini", "groq")
    fn name(&self) -> &str;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;

    fn convention(&self) -> CallingConvention;

    /// How images should be attached to requests for this provider
    fn preferred_image_encoding(&self) -> TransportEncoding;

    /// Whether an API key is present at all
    fn credential_configured(&self) -> bool;

    fn supports_streaming(&self) -> bool {
        true
    }

    /// Open a chat for `system_instruction`.
    ///
    /// Stateful providers return a handle; stateless providers return `None`
    /// and expect the system instruction with every request. Fails with
    /// [`ProviderError::Auth`] when no credential is configured.
    async fn initialize(&self, system_instruction: &str) -> Result<Option<ChatHandle>, ProviderError> {
        if !self.credential_configured() {
            return Err(ProviderError::Auth(format!(
                "no API key configured for {}",
                self.name()
            )));
        }

        match self.convention() {
            CallingConvention::Stateful => {
                let handle = ChatHandle::new(system_instruction);
                tracing::debug!(provider = %self.name(), handle = %handle.id(), "Opened chat handle");
                Ok(Some(handle))
            }
            CallingConvention::Stateless => Ok(None),
        }
    }

    /// Send a turn and get its reply as a fragment stream.
    ///
    /// Streaming requests use the provider's streaming endpoint; batch
    /// requests (or providers without streaming) yield a single fragment
    /// holding the whole reply.
    async fn send(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError> {
        if request.stream && self.supports_streaming() {
            return self.send_message_stream(request).await;
        }

        let response = self.send_message(request).await?;
        let (tx, rx) = mpsc::channel(2);
        // Capacity 2 holds both items, so these sends cannot fail.
        let _ = tx.send(Ok(StreamChunk::TextDelta(response.text))).await;
        let _ = tx
            .send(Ok(StreamChunk::Done {
                stop_reason: response.stop_reason,
            }))
            .await;
        Ok(rx)
    }
}
