//! OpenAI chat-completions adapter
//!
//! Buffered mode reads `choices[0].message.content`. Streamed mode parses the
//! server-sent event body incrementally and yields each `delta.content` as a chunk.

mod sse;

use crate::config::OpenAiConfig;
use crate::credentials::{Credential, CredentialStore};
use crate::error::{AppError, Result};
use crate::sources::{check_status, http_client, AnalysisEngine, TextChunkStream};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sse::SseDecoder;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Chat-completions analysis engine
pub struct OpenAiEngine {
    client: Client,
    base_url: String,
    model: String,
    credentials: Arc<CredentialStore>,
}

impl OpenAiEngine {
    pub fn new(config: &OpenAiConfig, credentials: Arc<CredentialStore>) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            credentials,
        })
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let api_key = self.credentials.resolve(Credential::OpenAi)?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        check_status("openai", response).await
    }
}

#[async_trait]
impl AnalysisEngine for OpenAiEngine {
    fn id(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        info!("OpenAi::complete - model {}", self.model);
        let response = self.send(prompt, false).await?;
        let body: ChatResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Validation("Completion has no message content".to_string()))
    }

    async fn stream(&self, prompt: &str) -> Result<TextChunkStream> {
        info!("OpenAi::stream - model {}", self.model);
        let response = self.send(prompt, true).await?;

        struct State<S> {
            body: S,
            decoder: SseDecoder,
            pending: VecDeque<Result<String>>,
            done: bool,
        }

        let state = State {
            body: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let chunks = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Some((chunk, state));
                }
                if state.done {
                    return None;
                }

                match state.body.next().await {
                    Some(Ok(bytes)) => {
                        for data in state.decoder.push(&bytes) {
                            match parse_stream_data(&data) {
                                Ok(StreamEvent::Delta(text)) => state.pending.push_back(Ok(text)),
                                Ok(StreamEvent::Empty) => {}
                                Ok(StreamEvent::Done) => {
                                    state.done = true;
                                    break;
                                }
                                Err(e) => {
                                    // Chunks decoded before the bad event are still delivered first
                                    state.pending.push_back(Err(e));
                                    state.done = true;
                                    break;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.pending.push_back(Err(AppError::from(e)));
                        state.done = true;
                    }
                    None => {
                        debug!("OpenAi stream closed");
                        state.done = true;
                    }
                }
            }
        });

        Ok(chunks.boxed())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    Delta(String),
    /// Role announcements and finish markers carry no text
    Empty,
    Done,
}

fn parse_stream_data(data: &str) -> Result<StreamEvent> {
    if data.trim() == "[DONE]" {
        return Ok(StreamEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
        .map(StreamEvent::Delta)
        .unwrap_or(StreamEvent::Empty))
}
