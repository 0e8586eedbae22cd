// Tutor session controller
//
// Owns the session state machine, the conversation and the provider chat
// handle. Every handler runs to completion over `&mut self`, so a session
// never has two requests in flight.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::conversation::{Conversation, Turn};
use super::error::TutorError;
use super::prompts::{
    APOLOGY_MESSAGE, AUTH_FAILURE_MESSAGE, EMPTY_REPLY_MESSAGE, IMAGE_ONLY_PROMPT,
    IMAGE_UNREADABLE_MESSAGE, SYSTEM_INSTRUCTION, WELCOME_MESSAGE,
};
use crate::config::Config;
use crate::media::{self, DecodedImage};
use crate::providers::{
    CallingConvention, ChatHandle, ContentBlock, LlmProvider, Message, ProviderError,
    ProviderRequest, Role, StreamChunk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable provider; all input is rejected
    Uninitialized,
    /// Waiting for student input
    Ready,
    /// A request is in flight
    AwaitingResponse,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::AwaitingResponse => "awaiting-response",
        };
        f.write_str(s)
    }
}

/// Request settings applied to every turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorOptions {
    pub stream: bool,
    /// Model override (provider default when unset)
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl Default for TutorOptions {
    fn default() -> Self {
        Self {
            stream: true,
            model: None,
            max_tokens: crate::config::constants::DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }
}

impl TutorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stream: config.streaming_enabled,
            model: None,
            max_tokens: config.tutor.max_tokens,
            temperature: config.tutor.temperature,
        }
    }
}

/// Student input for one turn: text, an image upload, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub text: String,
    /// Raw bytes of an uploaded PNG or JPEG
    pub image: Option<Vec<u8>>,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn image(raw: Vec<u8>) -> Self {
        Self {
            text: String::new(),
            image: Some(raw),
        }
    }

    pub fn with_image(mut self, raw: Vec<u8>) -> Self {
        self.image = Some(raw);
        self
    }
}

/// Result of a handled submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was appended or sent
    Ignored,
    /// The assistant turn appended for this submission
    Replied(Turn),
}

/// Receives a reply while it is being produced.
pub trait ReplyObserver {
    /// The request has been sent.
    fn on_waiting(&mut self) {}

    fn on_fragment(&mut self, _fragment: &str) {}

    /// The assistant turn (reply or notice) has been appended.
    fn on_complete(&mut self, _turn: &Turn) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReplyObserver for NoopObserver {}

/// Debug view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub handle_present: bool,
    /// Messages retained by the chat handle (0 for stateless providers)
    pub handle_messages: usize,
    pub credential_configured: bool,
    pub turn_count: usize,
    pub last_turn_at: Option<DateTime<Utc>>,
    pub provider: String,
    pub model: String,
}

impl fmt::Display for DebugSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sesión: {}", self.session_id)?;
        writeln!(f, "Estado: {}", self.state)?;
        writeln!(f, "Chat inicializado: {}", self.handle_present)?;
        writeln!(f, "Historial del chat: {}", self.handle_messages)?;
        writeln!(f, "API configurada: {}", self.credential_configured)?;
        writeln!(f, "Mensajes: {}", self.turn_count)?;
        if let Some(at) = self.last_turn_at {
            writeln!(f, "Último mensaje: {}", at.format("%H:%M:%S UTC"))?;
        }
        write!(f, "Proveedor: {} ({})", self.provider, self.model)
    }
}

pub struct TutorSession {
    id: Uuid,
    provider: Arc<dyn LlmProvider>,
    options: TutorOptions,
    state: SessionState,
    conversation: Conversation,
    handle: Option<ChatHandle>,
}

impl TutorSession {
    /// Create an uninitialized session. Call [`start`](Self::start) next.
    pub fn new(provider: Arc<dyn LlmProvider>, options: TutorOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            options,
            state: SessionState::Uninitialized,
            conversation: Conversation::new(),
            handle: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn options(&self) -> &TutorOptions {
        &self.options
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Model requests go to.
    pub fn model(&self) -> &str {
        self.options
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Initialize the provider and become ready.
    ///
    /// On failure the session stays uninitialized and rejects input until a
    /// later `start`, `on_reset` or `replace_provider` succeeds.
    pub async fn start(&mut self) -> Result<(), TutorError> {
        self.handle = None;

        match self.provider.initialize(SYSTEM_INSTRUCTION).await {
            Ok(handle) => {
                self.handle = handle;
                self.state = SessionState::Ready;
                if self.conversation.is_empty() {
                    self.conversation.append(Turn::welcome(WELCOME_MESSAGE));
                }
                tracing::info!(
                    session = %self.id,
                    provider = %self.provider.name(),
                    model = %self.model(),
                    handle = ?self.handle.as_ref().map(|h| h.id()),
                    "Tutor session ready"
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Uninitialized;
                tracing::warn!(
                    session = %self.id,
                    provider = %self.provider.name(),
                    error = %e,
                    "Provider initialization failed"
                );
                Err(match e {
                    ProviderError::Auth(msg) => TutorError::Credential(msg),
                    other => TutorError::Provider(other),
                })
            }
        }
    }

    /// Clear the conversation, drop the chat handle and initialize again.
    pub async fn on_reset(&mut self) -> Result<(), TutorError> {
        tracing::debug!(session = %self.id, turns = self.conversation.len(), "Resetting session");
        self.conversation.reset();
        self.handle = None;
        self.state = SessionState::Uninitialized;
        self.start().await
    }

    /// Swap in a new provider (e.g. built with a corrected API key) and
    /// start over with it.
    pub async fn replace_provider(&mut self, provider: Arc<dyn LlmProvider>) -> Result<(), TutorError> {
        self.provider = provider;
        self.on_reset().await
    }

    pub async fn on_text_submit(&mut self, text: &str) -> Result<SubmitOutcome, TutorError> {
        self.submit(Submission::text(text)).await
    }

    pub async fn on_image_submit(&mut self, raw: Vec<u8>) -> Result<SubmitOutcome, TutorError> {
        self.submit(Submission::image(raw)).await
    }

    pub async fn submit(&mut self, submission: Submission) -> Result<SubmitOutcome, TutorError> {
        self.submit_with_observer(submission, &mut NoopObserver).await
    }

    /// Handle one submission, reporting reply fragments to `observer`.
    ///
    /// Text and image form a single turn and a single request. Provider
    /// failures do not return an error: they append an apology turn and the
    /// session stays ready.
    pub async fn submit_with_observer(
        &mut self,
        submission: Submission,
        observer: &mut dyn ReplyObserver,
    ) -> Result<SubmitOutcome, TutorError> {
        if self.state != SessionState::Ready {
            return Err(TutorError::NotReady(format!(
                "no hay un proveedor configurado ({})",
                self.provider.name()
            )));
        }

        let text = submission.text.trim();
        if text.is_empty() && submission.image.is_none() {
            return Ok(SubmitOutcome::Ignored);
        }

        let image = match submission.image.as_deref() {
            Some(raw) => Some(media::decode(raw)?),
            None => None,
        };

        let prompt = if text.is_empty() {
            IMAGE_ONLY_PROMPT.to_string()
        } else {
            text.to_string()
        };

        if self.provider.convention() == CallingConvention::Stateful && self.handle.is_none() {
            self.reopen_handle().await?;
        }

        let outbound = self.outbound_message(&prompt, image.as_ref());
        let request = self.build_request(outbound.clone());
        let had_image = image.is_some();

        self.conversation.append(Turn::user(prompt, image));
        self.state = SessionState::AwaitingResponse;
        observer.on_waiting();

        tracing::debug!(
            session = %self.id,
            provider = %self.provider.name(),
            messages = request.messages.len(),
            image = had_image,
            stream = request.stream,
            "Sending turn"
        );

        let reply = match self.collect_reply(&request, observer).await {
            Ok(text) => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.record_exchange(outbound, text.clone());
                }
                Turn::assistant(text)
            }
            Err((partial, e)) => {
                tracing::warn!(
                    session = %self.id,
                    provider = %self.provider.name(),
                    error = %e,
                    partial_chars = partial.chars().count(),
                    "Reply failed"
                );
                Turn::notice(failure_text(&partial, &e, had_image))
            }
        };

        self.conversation.append(reply.clone());
        self.state = SessionState::Ready;
        observer.on_complete(&reply);
        Ok(SubmitOutcome::Replied(reply))
    }

    pub fn snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            session_id: self.id,
            state: self.state,
            handle_present: self.handle.is_some(),
            handle_messages: self.handle.as_ref().map_or(0, |h| h.history().len()),
            credential_configured: self.provider.credential_configured(),
            turn_count: self.conversation.len(),
            last_turn_at: self.conversation.last().map(|t| t.created_at()),
            provider: self.provider.name().to_string(),
            model: self.model().to_string(),
        }
    }

    /// Open a fresh chat handle after a reset left none. Only a rejected
    /// credential makes the session uninitialized; other failures leave it
    /// ready so the student can simply try again.
    async fn reopen_handle(&mut self) -> Result<(), TutorError> {
        match self.provider.initialize(SYSTEM_INSTRUCTION).await {
            Ok(handle) => {
                self.handle = handle;
                Ok(())
            }
            Err(ProviderError::Auth(msg)) => {
                self.state = SessionState::Uninitialized;
                tracing::warn!(session = %self.id, error = %msg, "Chat handle rejected credential");
                Err(TutorError::Credential(msg))
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "Could not reopen chat handle");
                Err(TutorError::Provider(e))
            }
        }
    }

    /// The new turn as sent: text part first, then the image if any.
    fn outbound_message(&self, prompt: &str, image: Option<&DecodedImage>) -> Message {
        let mut content = vec![ContentBlock::text(prompt)];
        if let Some(img) = image {
            let payload = media::encode_for_transport(img, self.provider.preferred_image_encoding());
            content.push(ContentBlock::image(payload));
        }
        Message::with_content(Role::User, content)
    }

    fn build_request(&self, turn: Message) -> ProviderRequest {
        let request = match (self.provider.convention(), &self.handle) {
            (CallingConvention::Stateful, Some(handle)) => handle.request_for(turn),
            _ => {
                let mut messages = self.conversation.replay_history();
                messages.push(turn);
                ProviderRequest::new(messages).with_system(SYSTEM_INSTRUCTION)
            }
        };

        let mut request = request
            .with_max_tokens(self.options.max_tokens)
            .with_stream(self.options.stream);
        if let Some(model) = &self.options.model {
            request = request.with_model(model.clone());
        }
        if let Some(t) = self.options.temperature {
            request = request.with_temperature(t);
        }
        request
    }

    /// Drain the reply stream. On failure returns the text received so far.
    async fn collect_reply(
        &self,
        request: &ProviderRequest,
        observer: &mut dyn ReplyObserver,
    ) -> Result<String, (String, ProviderError)> {
        let mut rx = self
            .provider
            .send(request)
            .await
            .map_err(|e| (String::new(), e))?;

        let mut text = String::new();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(StreamChunk::TextDelta(fragment)) => {
                    observer.on_fragment(&fragment);
                    text.push_str(&fragment);
                }
                Ok(StreamChunk::Done { stop_reason }) => {
                    tracing::debug!(session = %self.id, ?stop_reason, "Reply complete");
                    break;
                }
                Err(e) => return Err((text, e)),
            }
        }

        if text.trim().is_empty() {
            return Err((text, ProviderError::EmptyResponse));
        }
        Ok(text)
    }
}

/// Assistant text standing in for a failed reply.
fn failure_text(partial: &str, error: &ProviderError, had_image: bool) -> String {
    let notice = match error {
        ProviderError::EmptyResponse if had_image => IMAGE_UNREADABLE_MESSAGE,
        ProviderError::EmptyResponse => EMPTY_REPLY_MESSAGE,
        ProviderError::Auth(_) => AUTH_FAILURE_MESSAGE,
        _ => APOLOGY_MESSAGE,
    };

    if partial.trim().is_empty() {
        notice.to_string()
    } else {
        format!("{}\n\n{}", partial.trim_end(), notice)
    }
}
