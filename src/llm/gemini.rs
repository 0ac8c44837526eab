//! Gemini client over the Generative Language API
//!
//! Gemini has no system role here, so system instructions are folded into the
//! first user turn. Assistant turns are sent with the `model` role.

use crate::llm::client::{http_client, LLMClient, ModelParams, TokenStream};
use crate::llm::sse::sse_events;
use crate::types::{AppError, Message, MessageRole, Result};
use crate::utils::retry::send_with_retry;
use async_trait::async_trait;
use futures::StreamExt;

const PROVIDER: &str = "gemini";

/// Gemini client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    params: ModelParams,
}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
struct Part {
    text: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topK", skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(rename = "topP", skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn is_finished(&self) -> bool {
        self.candidates.iter().any(|c| c.finish_reason.is_some())
    }

    fn text(self) -> std::result::Result<String, String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(format!("Prompt blocked: {}", reason));
        }
        Ok(self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default())
    }
}

/// Build Gemini `contents`: system text prefixed to the first user turn.
fn to_contents(messages: &[Message]) -> Vec<Content> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect();
    let mut pending_system = (!system.is_empty()).then(|| system.join("\n\n"));

    let mut contents = Vec::with_capacity(messages.len());
    for message in messages.iter().filter(|m| m.role != MessageRole::System) {
        let (role, text) = match message.role {
            MessageRole::User => match pending_system.take() {
                Some(system) => ("user", format!("{}\n\n{}", system, message.content)),
                None => ("user", message.content.clone()),
            },
            _ => ("model", message.content.clone()),
        };
        contents.push(Content {
            role,
            parts: vec![Part { text }],
        });
    }

    // No user turn to carry it: the instruction becomes its own turn
    if let Some(system) = pending_system {
        contents.insert(
            0,
            Content {
                role: "user",
                parts: vec![Part { text: system }],
            },
        );
    }

    contents
}

impl GeminiClient {
    pub fn new(api_key: String, api_base: String, model: String, params: ModelParams) -> Result<Self> {
        Ok(Self {
            client: http_client(PROVIDER)?,
            api_key,
            api_base,
            model,
            params,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.api_base, self.model, method)
    }

    fn request(&self, messages: &[Message]) -> GenerateRequest {
        GenerateRequest {
            contents: to_contents(messages),
            generation_config: GenerationConfig {
                temperature: self.params.temperature,
                max_output_tokens: self.params.max_tokens,
                top_k: self.params.top_k,
                top_p: self.params.top_p,
            },
        }
    }

    async fn send(&self, url: &str, body: &GenerateRequest) -> Result<reqwest::Response> {
        send_with_retry(self.params.retry_policy(), || {
            self.client
                .post(url)
                .query(&[("key", self.api_key.as_str())])
                .json(body)
        })
        .await
        .map_err(|e| AppError::provider(PROVIDER, e))
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let url = self.endpoint("generateContent");
        let response = self.send(&url, &self.request(messages)).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider(PROVIDER, format!("Failed to parse Gemini response: {}", e)))?;

        let text = body.text().map_err(|e| AppError::provider(PROVIDER, e))?;
        if text.is_empty() {
            return Err(AppError::provider(PROVIDER, "No text in Gemini response"));
        }
        Ok(text)
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.send(&url, &self.request(messages)).await?;
        let mut events = Box::pin(sse_events(response.bytes_stream()));

        let result_stream = async_stream::stream! {
            let mut finished = false;
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(AppError::provider(PROVIDER, format!("Stream error: {}", e)));
                        return;
                    }
                };
                let parsed = serde_json::from_str::<GenerateResponse>(&event.data)
                    .map_err(|e| format!("Malformed stream chunk: {}", e))
                    .and_then(|chunk| {
                        finished |= chunk.is_finished();
                        chunk.text()
                    });
                match parsed {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => yield Ok(text),
                    Err(e) => {
                        yield Err(AppError::provider(PROVIDER, e));
                        return;
                    }
                }
            }
            if !finished {
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
