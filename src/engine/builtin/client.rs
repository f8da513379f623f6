//! OpenAI-compatible chat-completions client.
//!
//! Streaming requests read server-sent events and yield [`StreamDelta`]s;
//! models configured without streaming use a single JSON round trip.

use std::env;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::models::{ChatMessage, ModelDescriptor};
use crate::{AppError, Result};

/// Token usage reported by the API.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u64,
}

/// One decoded piece of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelta {
    /// Content text.
    Content(String),
    /// Final usage numbers.
    Usage(Usage),
    /// `[DONE]` marker.
    Done,
}

/// Full non-streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Reply text.
    pub content: String,
    /// Usage, when reported.
    pub usage: Option<Usage>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental server-sent-events decoder.
///
/// Bytes may split lines, and multi-byte characters, anywhere. Only complete
/// `data:` lines are decoded as UTF-8; unparseable payloads are skipped.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    /// Create an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every delta completed by them.
    pub fn push(&mut self, bytes: impl AsRef<[u8]>) -> Vec<StreamDelta> {
        self.buffer.extend_from_slice(bytes.as_ref());
        let mut deltas = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line,
                Err(err) => {
                    debug!(error = %err, "skipping non-utf8 event line");
                    continue;
                }
            };
            let line = line.trim_end_matches(['\r', '\n']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();

            if data == "[DONE]" {
                deltas.push(StreamDelta::Done);
                continue;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => {
                    if let Some(content) = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                        .filter(|content| !content.is_empty())
                    {
                        deltas.push(StreamDelta::Content(content));
                    }
                    if let Some(usage) = chunk.usage {
                        deltas.push(StreamDelta::Usage(usage));
                    }
                }
                Err(err) => debug!(error = %err, "skipping unparseable event"),
            }
        }

        deltas
    }
}

/// Boxed delta stream borrowed from the client.
pub type DeltaStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamDelta>> + Send + 'a>>;

/// Chat-completions client bound to one API base.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_base: String,
}

impl ChatClient {
    /// Build a client with a request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Engine` if the HTTP client cannot be built.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn request(&self, model: &ModelDescriptor, body: &Value) -> reqwest::RequestBuilder {
        let request = self.http.post(self.url()).json(body);
        match env::var(&model.api_key_env) {
            Ok(key) if !key.trim().is_empty() => request.bearer_auth(key.trim()),
            _ => request,
        }
    }

    /// Stream a completion.
    pub fn stream<'a>(
        &'a self,
        model: &'a ModelDescriptor,
        messages: Vec<ChatMessage>,
    ) -> DeltaStream<'a> {
        let body = request_body(model, &messages, true);

        Box::pin(async_stream::try_stream! {
            let response = self.request(model, &body).send().await?;
            let response = check_status(response).await?;

            let mut bytes = response.bytes_stream();
            let mut parser = SseParser::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for delta in parser.push(&chunk) {
                    let done = delta == StreamDelta::Done;
                    yield delta;
                    if done {
                        return;
                    }
                }
            }

            yield StreamDelta::Done;
        })
    }

    /// Request a completion in one round trip.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Engine` on transport failures, error statuses, or
    /// an unparseable body.
    pub async fn complete(
        &self,
        model: &ModelDescriptor,
        messages: Vec<ChatMessage>,
    ) -> Result<Completion> {
        let body = request_body(model, &messages, false);
        let response = self.request(model, &body).send().await?;
        let response = check_status(response).await?;

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Completion {
            content,
            usage: parsed.usage,
        })
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    warn!(%status, "model request rejected");
    Err(AppError::Engine(format!(
        "model request failed with status {status}: {}",
        text.trim()
    )))
}

/// JSON body for a chat-completions request.
///
/// `extra_body` entries are flattened into the top level; every other extra
/// parameter is inserted as-is.
#[must_use]
pub fn request_body(model: &ModelDescriptor, messages: &[ChatMessage], stream: bool) -> Value {
    let mut body = Map::new();
    body.insert("model".into(), Value::String(model.name.clone()));
    body.insert("messages".into(), json!(messages));
    body.insert("stream".into(), Value::Bool(stream));
    if stream {
        body.insert("stream_options".into(), json!({ "include_usage": true }));
    }

    for (key, value) in &model.extra_params {
        match (key.as_str(), value) {
            ("extra_body", Value::Object(extra)) => {
                for (inner_key, inner_value) in extra {
                    body.insert(inner_key.clone(), inner_value.clone());
                }
            }
            _ => {
                body.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(body)
}
