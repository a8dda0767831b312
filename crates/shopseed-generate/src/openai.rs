use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{Completion, CompletionRequest, TextBackend};
use crate::errors::BackendError;

/// Connection settings for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Ask for server-sent event fragments instead of one response body.
    pub stream: bool,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini-2024-07-18".to_string(),
            stream: false,
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: ChatContent,
}

#[derive(Debug, Default, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TextBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, BackendError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            stream: self.config.stream,
        };

        debug!(
            event = "completion_requested",
            model = %self.config.model,
            max_tokens = request.max_tokens,
            stream = self.config.stream
        );
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if self.config.stream {
            let fragments = sse_fragments(Box::pin(response.bytes_stream()));
            return Ok(Completion::Fragments(fragments.boxed()));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(Completion::Text(text))
    }
}

/// Incremental decoder for chat-completion server-sent events.
///
/// Network chunks may split an event anywhere, including inside a multi-byte
/// character; only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Feed one network chunk and return the content fragments it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            fragments.extend(self.decode_line(&line));
        }
        fragments
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.decode_line(&rest).into_iter().collect()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<String> {
        if self.done {
            return None;
        }
        let line = String::from_utf8_lossy(line);
        let payload = line.trim().strip_prefix("data:")?.trim();
        if payload == "[DONE]" {
            self.done = true;
            return None;
        }
        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(event = "sse_event_skipped", error = %err);
                return None;
            }
        };
        chunk
            .choices
            .into_iter()
            .next()?
            .delta
            .content
            .filter(|content| !content.is_empty())
    }
}

struct FragmentState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    ended: bool,
}

fn sse_fragments<S, B>(bytes: S) -> impl Stream<Item = Result<String, BackendError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = FragmentState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        ended: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.ended {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let fragments = state.decoder.push(chunk.as_ref());
                    state.pending.extend(fragments);
                    if state.decoder.is_done() {
                        state.ended = true;
                    }
                }
                Some(Err(err)) => {
                    state.ended = true;
                    return Some((Err(BackendError::from(err)), state));
                }
                None => {
                    state.ended = true;
                    let fragments = state.decoder.finish();
                    state.pending.extend(fragments);
                }
            }
        }
    })
}
