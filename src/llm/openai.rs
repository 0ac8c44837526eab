use crate::llm::client::{http_client, LLMClient, ModelParams, TokenStream};
use crate::llm::sse::sse_events;
use crate::types::{AppError, Message, Result};
use crate::utils::retry::send_with_retry;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "openai";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    params: ModelParams,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, params: ModelParams) -> Result<Self> {
        Ok(Self {
            client: http_client(PROVIDER)?,
            api_key,
            api_base,
            model,
            params,
        })
    }

    fn request<'a>(&'a self, messages: &'a [Message], stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            top_p: self.params.top_p,
            stream,
        }
    }

    async fn send(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        send_with_retry(self.params.retry_policy(), || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
        })
        .await
        .map_err(|e| AppError::provider(PROVIDER, e))
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let response = self.send(&self.request(messages, false)).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("Invalid response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::provider(PROVIDER, "No response from OpenAI"))
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let response = self.send(&self.request(messages, true)).await?;
        let mut events = Box::pin(sse_events(response.bytes_stream()));

        let result_stream = async_stream::stream! {
            let mut saw_done = false;
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(AppError::provider(PROVIDER, format!("Stream error: {}", e)));
                        return;
                    }
                };
                if event.data == "[DONE]" {
                    saw_done = true;
                    break;
                }
                match serde_json::from_str::<StreamChunk>(&event.data) {
                    Ok(chunk) => {
                        if let Some(error) = chunk.error {
                            yield Err(AppError::provider(PROVIDER, format!("Stream error: {}", error)));
                            return;
                        }
                        for choice in chunk.choices {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(content);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::provider(PROVIDER, format!("Malformed stream chunk: {}", e)));
                        return;
                    }
                }
            }
            if !saw_done {
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
