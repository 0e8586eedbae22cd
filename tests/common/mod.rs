// Shared test helpers: a scripted provider double and image fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use matetutor::media::TransportEncoding;
use matetutor::providers::{
    CallingConvention, LlmProvider, ProviderError, ProviderRequest, ProviderResponse, ReplyStream,
    StreamChunk,
};
use matetutor::tutor::{ReplyObserver, Turn};

/// What the scripted provider does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream these fragments, then finish normally
    Fragments(Vec<String>),
    /// Fail before any fragment is produced
    Fail(ProviderError),
    /// Stream these fragments, then fail
    FailAfter(Vec<String>, ProviderError),
}

impl Reply {
    pub fn text(fragments: &[&str]) -> Self {
        Reply::Fragments(fragments.iter().map(|s| s.to_string()).collect())
    }
}

/// What the scripted provider does for one `initialize` call.
#[derive(Debug, Clone)]
pub enum Init {
    /// Succeed without opening a chat handle
    NoHandle,
    Fail(ProviderError),
}

/// Provider double that replays a script and records every request.
pub struct ScriptedProvider {
    name: String,
    convention: CallingConvention,
    encoding: TransportEncoding,
    api_key: String,
    script: Mutex<VecDeque<Reply>>,
    init_script: Mutex<VecDeque<Init>>,
    fallback: Reply,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
    init_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Stateful provider (handle-based, native images), like Gemini.
    pub fn stateful() -> Self {
        Self::new("scripted-chat", CallingConvention::Stateful, TransportEncoding::Native)
    }

    /// Stateless provider (full replay, data URI images), like Groq.
    pub fn stateless() -> Self {
        Self::new("scripted-completions", CallingConvention::Stateless, TransportEncoding::DataUri)
    }

    fn new(name: &str, convention: CallingConvention, encoding: TransportEncoding) -> Self {
        Self {
            name: name.to_string(),
            convention,
            encoding,
            api_key: "test-key".to_string(),
            script: Mutex::new(VecDeque::new()),
            init_script: Mutex::new(VecDeque::new()),
            fallback: Reply::text(&["¿Qué has intentado hasta ahora?"]),
            requests: Arc::new(Mutex::new(Vec::new())),
            init_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = key.to_string();
        self
    }

    /// Queue replies, used in order before the fallback.
    pub fn with_script(self, replies: Vec<Reply>) -> Self {
        self.script.lock().unwrap().extend(replies);
        self
    }

    /// Queue `initialize` outcomes, used in order before the normal
    /// key-based behaviour.
    pub fn with_init_script(self, outcomes: Vec<Init>) -> Self {
        self.init_script.lock().unwrap().extend(outcomes);
        self
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Handle to the recorded requests, usable after the provider is moved
    /// into a session.
    pub fn requests(&self) -> Arc<Mutex<Vec<ProviderRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &ProviderRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn send_message(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_reply(request) {
            Reply::Fragments(fragments) => Ok(ProviderResponse {
                id: "scripted".to_string(),
                model: self.default_model().to_string(),
                text: fragments.concat(),
                stop_reason: Some("stop".to_string()),
                provider: self.name.clone(),
            }),
            Reply::Fail(e) | Reply::FailAfter(_, e) => Err(e),
        }
    }

    async fn send_message_stream(&self, request: &ProviderRequest) -> Result<ReplyStream, ProviderError> {
        let reply = self.next_reply(request);
        let (tx, rx) = mpsc::channel(32);

        match reply {
            Reply::Fail(e) => return Err(e),
            Reply::Fragments(fragments) => {
                for f in fragments {
                    tx.send(Ok(StreamChunk::TextDelta(f))).await.unwrap();
                }
                tx.send(Ok(StreamChunk::Done {
                    stop_reason: Some("stop".to_string()),
                }))
                .await
                .unwrap();
            }
            Reply::FailAfter(fragments, e) => {
                for f in fragments {
                    tx.send(Ok(StreamChunk::TextDelta(f))).await.unwrap();
                }
                tx.send(Err(e)).await.unwrap();
            }
        }

        Ok(rx)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    fn convention(&self) -> CallingConvention {
        self.convention
    }

    fn preferred_image_encoding(&self) -> TransportEncoding {
        self.encoding
    }

    fn credential_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn initialize(
        &self,
        system_instruction: &str,
    ) -> Result<Option<matetutor::providers::ChatHandle>, ProviderError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.init_script.lock().unwrap().pop_front();
        match scripted {
            Some(Init::NoHandle) => return Ok(None),
            Some(Init::Fail(e)) => return Err(e),
            None => {}
        }
        if !self.credential_configured() {
            return Err(ProviderError::Auth("no API key configured".to_string()));
        }
        Ok(match self.convention {
            CallingConvention::Stateful => {
                Some(matetutor::providers::ChatHandle::new(system_instruction))
            }
            CallingConvention::Stateless => None,
        })
    }
}

/// Observer that records everything it is told.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub waiting: usize,
    pub fragments: Vec<String>,
    pub completed: Vec<Turn>,
}

impl ReplyObserver for RecordingObserver {
    fn on_waiting(&mut self) {
        self.waiting += 1;
    }

    fn on_fragment(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_string());
    }

    fn on_complete(&mut self, turn: &Turn) {
        self.completed.push(turn.clone());
    }
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 40) as u8, (y * 60) as u8, ((x + y) * 10) as u8, 255])
    });
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// A small valid PNG.
pub fn tiny_png() -> Vec<u8> {
    encode(4, 3, ImageFormat::Png)
}

/// A small valid JPEG.
pub fn tiny_jpeg() -> Vec<u8> {
    encode(8, 8, ImageFormat::Jpeg)
}
