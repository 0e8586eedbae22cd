// Google Gemini API provider implementation
//
// Gemini names the assistant role "model", takes the system instruction as a
// dedicated field and accepts images as inline base64 parts. The chat is
// client-side state (a ChatHandle), matching how Gemini's own SDK chats work.

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::retry::{with_retry, RetryPolicy};
use super::sse::{SseBuffer, StreamErrorEvent};
use super::types::{ContentBlock, ProviderRequest, ProviderResponse, ReplyStream, Role, StreamChunk};
use super::{CallingConvention, LlmProvider, ProviderError};
use crate::media::TransportEncoding;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Google Gemini API provider
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    retry: RetryPolicy,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            default_model: GEMINI_DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Create with custom default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at a different endpoint (proxies, tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn model_for(&self, request: &ProviderRequest) -> String {
        if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        }
    }

    /// Convert ProviderRequest to Gemini API format
    fn to_gemini_request(&self, request: &ProviderRequest) -> Result<GeminiRequest, ProviderError> {
        let mut contents = Vec::with_capacity(request.messages.len());

        for msg in &request.messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            };

            let mut parts = Vec::with_capacity(msg.content.len());
            for block in &msg.content {
                match block {
                    ContentBlock::Text { text } => {
                        if !text.is_empty() {
                            parts.push(GeminiPart::Text { text: text.clone() });
                        }
                    }
                    ContentBlock::Image { source } => {
                        let (mime_type, data) = source
                            .inline_parts()
                            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                        parts.push(GeminiPart::InlineData {
                            inline_data: GeminiInlineData { mime_type, data },
                        });
                    }
                }
            }

            if !parts.is_empty() {
                contents.push(GeminiContent {
                    role: Some(role.to_string()),
                    parts,
                });
            }
        }

        let system_instruction = request.system.as_ref().map(|system| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text {
                text: system.clone(),
            }],
        });

        Ok(GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: Some(request.max_tokens),
            }),
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(&self, url: &str, body: &GeminiRequest) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status("gemini", status.as_u16(), error_body));
        }

        Ok(response)
    }

    /// Send a single message request (no retry)
    async fn send_message_once(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = self.model_for(request);
        let body = self.to_gemini_request(request)?;

        tracing::debug!(
            model = %model,
            messages = body.contents.len(),
            images = request.image_count(),
            "Sending request to Gemini API"
        );

        let response = self.post(&self.url(&model, "generateContent"), &body).await?;
        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(error) = gemini_response.error {
            return Err(error.into_provider_error("gemini"));
        }

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(ProviderResponse {
            id: gemini_response.response_id.unwrap_or_default(),
            model,
            text: candidate.text(),
            stop_reason: candidate.finish_reason,
            provider: "gemini".to_string(),
        })
    }

    /// Send a message with streaming response (no retry)
    async fn send_message_stream_once(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError> {
        let model = self.model_for(request);
        let body = self.to_gemini_request(request)?;
        let url = format!("{}?alt=sse", self.url(&model, "streamGenerateContent"));

        tracing::debug!(
            model = %model,
            messages = body.contents.len(),
            images = request.image_count(),
            "Sending streaming request to Gemini API"
        );

        let response = self.post(&url, &body).await?;
        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut sse = SseBuffer::new();
            let mut stop_reason = None;

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(error = %e, "Gemini stream interrupted");
                        let _ = tx.send(Err(ProviderError::from(e))).await;
                        return;
                    }
                };

                for payload in sse.push(&bytes) {
                    if !emit_gemini_event(&payload, &tx, &mut stop_reason).await {
                        return;
                    }
                }
            }

            if let Some(payload) = sse.finish() {
                if !emit_gemini_event(&payload, &tx, &mut stop_reason).await {
                    return;
                }
            }

            let _ = tx.send(Ok(StreamChunk::Done { stop_reason })).await;
            tracing::debug!("Gemini streaming task finished");
        });

        Ok(rx)
    }
}

/// Forward the text of one SSE payload. Returns false when the stream must
/// stop: the provider sent an error event or the receiver has gone away.
async fn emit_gemini_event(
    payload: &str,
    tx: &mpsc::Sender<Result<StreamChunk, ProviderError>>,
    stop_reason: &mut Option<String>,
) -> bool {
    let event: GeminiResponse = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable Gemini stream event");
            return true;
        }
    };

    if let Some(error) = event.error {
        let error = error.into_provider_error("gemini");
        tracing::warn!(error = %error, "Gemini stream reported an error");
        let _ = tx.send(Err(error)).await;
        return false;
    }

    if let Some(candidate) = event.candidates.into_iter().next() {
        let text = candidate.text();
        if !text.is_empty() && tx.send(Ok(StreamChunk::TextDelta(text))).await.is_err() {
            return false;
        }
        if candidate.finish_reason.is_some() {
            *stop_reason = candidate.finish_reason;
        }
    }
    true
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        with_retry(self.retry, || self.send_message_once(request)).await
    }

    async fn send_message_stream(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError> {
        with_retry(self.retry, || self.send_message_stream_once(request)).await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn convention(&self) -> CallingConvention {
        CallingConvention::Stateful
    }

    fn preferred_image_encoding(&self) -> TransportEncoding {
        TransportEncoding::Native
    }

    fn credential_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// Gemini API types

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    response_id: Option<String>,
    #[serde(default)]
    error: Option<StreamErrorEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl GeminiCandidate {
    /// Concatenated text parts; thought summaries are skipped.
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}
