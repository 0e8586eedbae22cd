// OpenAI-compatible provider implementation
//
// Groq serves an OpenAI-compatible chat completions API, so the same adapter
// covers Groq (the default second provider) and OpenAI proper. These APIs
// keep no chat state: every call carries the system message and the whole
// history.

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::retry::{with_retry, RetryPolicy};
use super::sse::{SseBuffer, StreamErrorEvent};
use super::types::{ContentBlock, ProviderRequest, ProviderResponse, ReplyStream, StreamChunk};
use super::{CallingConvention, LlmProvider, ProviderError};
use crate::media::TransportEncoding;

const REQUEST_TIMEOUT_SECS: u64 = 60;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
pub const GROQ_DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible chat completions provider
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    provider_name: String,
    retry: RetryPolicy,
}

impl OpenAIProvider {
    /// Create a new Groq provider
    pub fn new_groq(api_key: String) -> Result<Self, ProviderError> {
        Self::new(api_key, GROQ_BASE_URL, GROQ_DEFAULT_MODEL, "groq")
    }

    /// Create a new OpenAI provider
    pub fn new_openai(api_key: String) -> Result<Self, ProviderError> {
        Self::new(api_key, OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL, "openai")
    }

    fn new(api_key: String, base_url: &str, default_model: &str, provider_name: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.to_string(),
            default_model: default_model.to_string(),
            provider_name: provider_name.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Set custom model for this provider
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Convert ProviderRequest to OpenAI API format
    fn to_openai_request(&self, request: &ProviderRequest) -> Result<OpenAIRequest, ProviderError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: OpenAIContent::Text(system.clone()),
            });
        }

        for msg in &request.messages {
            let content = if msg.has_image() {
                let mut parts = Vec::with_capacity(msg.content.len());
                for block in &msg.content {
                    match block {
                        ContentBlock::Text { text } => {
                            if !text.is_empty() {
                                parts.push(OpenAIContentPart::Text { text: text.clone() });
                            }
                        }
                        ContentBlock::Image { source } => parts.push(OpenAIContentPart::ImageUrl {
                            image_url: OpenAIImageUrl {
                                url: source.data_uri(),
                            },
                        }),
                    }
                }
                OpenAIContent::Parts(parts)
            } else {
                let text = msg.text();
                if text.trim().is_empty() {
                    continue;
                }
                OpenAIContent::Text(text)
            };

            messages.push(OpenAIMessage {
                role: msg.role.as_str().to_string(),
                content,
            });
        }

        Ok(OpenAIRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stream: request.stream,
        })
    }

    async fn post(&self, body: &OpenAIRequest) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(&self.provider_name, status.as_u16(), error_body));
        }

        Ok(response)
    }

    /// Send a single message request (no retry)
    async fn send_message_once(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut body = self.to_openai_request(request)?;
        body.stream = false;

        tracing::debug!(
            provider = %self.provider_name,
            model = %body.model,
            messages = body.messages.len(),
            images = request.image_count(),
            "Sending chat completion request"
        );

        let response = self.post(&body).await?;
        let completion: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(ProviderResponse {
            id: completion.id.unwrap_or_default(),
            model: completion.model.unwrap_or(body.model),
            text: choice.message.content.unwrap_or_default(),
            stop_reason: choice.finish_reason,
            provider: self.provider_name.clone(),
        })
    }

    /// Send a message with streaming response (no retry)
    async fn send_message_stream_once(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError> {
        let mut body = self.to_openai_request(request)?;
        body.stream = true;

        tracing::debug!(
            provider = %self.provider_name,
            model = %body.model,
            messages = body.messages.len(),
            images = request.image_count(),
            "Sending streaming chat completion request"
        );

        let response = self.post(&body).await?;
        let provider = self.provider_name.clone();
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut sse = SseBuffer::new();
            let mut stop_reason = None;

            'read: while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(provider = %provider, error = %e, "Stream interrupted");
                        let _ = tx.send(Err(ProviderError::from(e))).await;
                        return;
                    }
                };

                for payload in sse.push(&bytes) {
                    if payload == "[DONE]" {
                        tracing::debug!(provider = %provider, "Received [DONE]");
                        break 'read;
                    }
                    if !emit_openai_event(&payload, &tx, &mut stop_reason, &provider).await {
                        return;
                    }
                }
            }

            if let Some(payload) = sse.finish() {
                if payload != "[DONE]" && !emit_openai_event(&payload, &tx, &mut stop_reason, &provider).await {
                    return;
                }
            }

            let _ = tx.send(Ok(StreamChunk::Done { stop_reason })).await;
        });

        Ok(rx)
    }
}

/// Forward the delta text of one SSE payload. Returns false when the stream
/// must stop: the provider sent an error event or the receiver has gone away.
async fn emit_openai_event(
    payload: &str,
    tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    stop_reason: &mut Option<String>,
    provider: &str,
) -> bool {
    let event: OpenAIStreamChunk = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream event");
            return true;
        }
    };

    if let Some(error) = event.error {
        let error = error.into_provider_error(provider);
        tracing::warn!(provider = %provider, error = %error, "Stream reported an error");
        let _ = tx.send(Err(error)).await;
        return false;
    }

    for choice in event.choices {
        if let Some(text) = choice.delta.content {
            if !text.is_empty() && tx.send(Ok(StreamChunk::TextDelta(text))).await.is_err() {
                return false;
            }
        }
        if choice.finish_reason.is_some() {
            *stop_reason = choice.finish_reason;
        }
    }
    true
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        with_retry(self.retry, || self.send_message_once(request)).await
    }

    async fn send_message_stream(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError> {
        with_retry(self.retry, || self.send_message_stream_once(request)).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn convention(&self) -> CallingConvention {
        CallingConvention::Stateless
    }

    fn preferred_image_encoding(&self) -> TransportEncoding {
        TransportEncoding::DataUri
    }

    fn credential_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// OpenAI API types

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIMessage {
    role: String,
    content: OpenAIContent,
}

/// Plain string for text-only turns, a parts array when an image is attached.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    error: Option<StreamErrorEvent>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TransportPayload;
    use crate::providers::{Message, Role};

    #[test]
    fn test_groq_defaults() {
        let p = OpenAIProvider::new_groq("gsk_test".to_string()).unwrap();
        assert_eq!(p.name(), "groq");
        assert_eq!(p.default_model(), GROQ_DEFAULT_MODEL);
        assert_eq!(p.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(p.convention(), CallingConvention::Stateless);
        assert_eq!(p.preferred_image_encoding(), TransportEncoding::DataUri);
    }

    #[test]
    fn test_openai_defaults() {
        let p = OpenAIProvider::new_openai("sk-test".to_string()).unwrap();
        assert_eq!(p.name(), "openai");
        assert_eq!(p.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_system_message_comes_first() {
        let p = OpenAIProvider::new_groq("k".to_string()).unwrap();
        let request = ProviderRequest::new(vec![Message::user("hola"), Message::assistant("¡Hola!")])
            .with_system("Eres MateTutor");
        let body = serde_json::to_value(p.to_openai_request(&request).unwrap()).unwrap();

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "Eres MateTutor");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(body["model"], GROQ_DEFAULT_MODEL);
    }

    #[test]
    fn test_image_turn_uses_content_parts() {
        let p = OpenAIProvider::new_groq("k".to_string()).unwrap();
        let uri = "data:image/jpeg;base64,/9j/AA==".to_string();
        let request = ProviderRequest::new(vec![Message::with_content(
            Role::User,
            vec![
                ContentBlock::text("¿cómo empiezo?"),
                ContentBlock::image(TransportPayload::DataUri(uri.clone())),
            ],
        )]);
        let body = serde_json::to_value(p.to_openai_request(&request).unwrap()).unwrap();

        let parts = &body["messages"][0]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "¿cómo empiezo?");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], uri.as_str());
    }

    #[test]
    fn test_blank_text_messages_are_skipped() {
        let p = OpenAIProvider::new_groq("k".to_string()).unwrap();
        let request = ProviderRequest::new(vec![Message::user("  "), Message::user("x")]);
        let body = p.to_openai_request(&request).unwrap();
        assert_eq!(body.messages.len(), 1);
    }

    #[test]
    fn test_stream_chunk_parsing() {
        let raw = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"¿Qué"},"finish_reason":null}]}"#;
        let chunk: OpenAIStreamChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("¿Qué"));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        let chunk: OpenAIStreamChunk = serde_json::from_str(role_only).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }
}
