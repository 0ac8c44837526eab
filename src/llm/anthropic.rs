//! Anthropic Claude client over the Messages API.
//!
//! System messages are lifted into the top-level `system` field; the rest of
//! the transcript is sent as alternating `user`/`assistant` messages.
//! Streaming uses the `content_block_delta` events of the SSE protocol.

use crate::llm::client::{http_client, LLMClient, ModelParams, TokenStream};
use crate::llm::sse::sse_events;
use crate::types::{AppError, Message, MessageRole, Result};
use crate::utils::retry::send_with_retry;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// The subset of stream events that carry text or errors.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: StreamDelta },
    Error { error: ApiError },
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    params: ModelParams,
}

impl AnthropicClient {
    pub fn new(api_key: String, api_base: String, model: String, params: ModelParams) -> Result<Self> {
        Ok(Self {
            client: http_client(PROVIDER)?,
            api_key,
            api_base,
            model,
            params,
        })
    }

    fn request<'a>(&'a self, messages: &'a [Message], stream: bool) -> MessagesRequest<'a> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let api_messages = messages
            .iter()
            .filter_map(|m| match m.role {
                MessageRole::System => None,
                MessageRole::User => Some(ApiMessage {
                    role: "user",
                    content: &m.content,
                }),
                MessageRole::Assistant => Some(ApiMessage {
                    role: "assistant",
                    content: &m.content,
                }),
            })
            .collect();

        MessagesRequest {
            model: &self.model,
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: api_messages,
            top_k: self.params.top_k,
            top_p: self.params.top_p,
            stream,
        }
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.api_base);
        send_with_retry(self.params.retry_policy(), || {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body)
        })
        .await
        .map_err(|e| AppError::provider(PROVIDER, e))
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let response = self.send(&self.request(messages, false)).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("Invalid response: {}", e)))?;

        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(AppError::provider(PROVIDER, "No text content in response"));
        }
        Ok(text)
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let response = self.send(&self.request(messages, true)).await?;
        let mut events = Box::pin(sse_events(response.bytes_stream()));

        let result_stream = async_stream::stream! {
            let mut saw_stop = false;
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(AppError::provider(PROVIDER, format!("Stream error: {}", e)));
                        return;
                    }
                };
                match serde_json::from_str::<StreamEvent>(&event.data) {
                    Ok(StreamEvent::ContentBlockDelta { delta }) => {
                        if let Some(text) = delta.text {
                            if !text.is_empty() {
                                yield Ok(text);
                            }
                        }
                    }
                    Ok(StreamEvent::Error { error }) => {
                        yield Err(AppError::provider(
                            PROVIDER,
                            format!("{}: {}", error.kind, error.message),
                        ));
                        return;
                    }
                    Ok(StreamEvent::MessageStop) => {
                        saw_stop = true;
                        break;
                    }
                    Ok(StreamEvent::Other) => {}
                    Err(e) => {
                        yield Err(AppError::provider(PROVIDER, format!("Malformed stream event: {}", e)));
                        return;
                    }
                }
            }
            if !saw_stop {
                yield Err(AppError::provider(PROVIDER, "stream ended before completion"));
            }
        };

        Ok(Box::new(Box::pin(result_stream)))
    }

    fn supports_streaming(&self) -> bool {
        self.params.streaming
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}
