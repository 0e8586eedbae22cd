// Server-sent events line buffer shared by the streaming adapters

use serde::Deserialize;

use super::ProviderError;

/// Accumulates raw body bytes and yields the payload of each complete
/// `data:` line. Bytes are kept until a newline arrives, so multi-byte UTF-8
/// characters split across network chunks are never mangled.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the `data:` payloads completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }

    /// Payload of a trailing `data:` line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        line.strip_prefix("data:")
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    }
}

/// Error object sent as a stream event after the response has started,
/// e.g. `data: {"error":{"code":500,"message":"..."}}`.
///
/// Gemini sends a numeric `code`; OpenAI-compatible servers may send a
/// string code or none at all, which counts as a server error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamErrorEvent {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl StreamErrorEvent {
    pub fn into_provider_error(self, provider: &str) -> ProviderError {
        let status = self
            .code
            .as_ref()
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .filter(|c| *c >= 400)
            .unwrap_or(500);
        ProviderError::from_status(provider, status, self.message.unwrap_or_default())
    }
}
