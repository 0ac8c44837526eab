//! Mock implementations for testing.
//!
//! Scripted chat clients and deterministic embeddings, so sessions can be
//! driven end to end without any network access.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use freestream::llm::{ActiveModel, LLMClient, LLMClientFactory, TokenStream};
use freestream::rag::embeddings::EmbeddingProvider;
use freestream::types::{AppError, Message, Result};

/// Every conversation a mock client was asked to answer.
pub type MessageLog = Arc<Mutex<Vec<Vec<Message>>>>;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Behavior {
    Answer,
    Fail,
    /// Emits the first fragment, then errors
    FailMidStream,
}

/// Mock LLM client with a scripted reply.
///
/// Streams the reply in five-character fragments and records the messages it
/// receives.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    streaming: bool,
    behavior: Behavior,
    model: String,
    log: MessageLog,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            streaming: true,
            behavior: Behavior::Answer,
            model: "mock-model".to_string(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A client that returns its whole reply from `generate`
    pub fn non_streaming(response: &str) -> Self {
        Self {
            streaming: false,
            ..Self::new(response)
        }
    }

    /// A client that always returns an error.
    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::new("")
        }
    }

    /// A client whose stream breaks after the first fragment.
    pub fn failing_mid_stream(response: &str) -> Self {
        Self {
            behavior: Behavior::FailMidStream,
            ..Self::new(response)
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn log(&self) -> MessageLog {
        self.log.clone()
    }

    fn record(&self, messages: &[Message]) -> Result<()> {
        self.log.lock().push(messages.to_vec());
        if self.behavior == Behavior::Fail {
            return Err(AppError::provider("mock", "Mock LLM failure"));
        }
        Ok(())
    }

    fn fragments(&self) -> Vec<String> {
        self.response
            .chars()
            .collect::<Vec<_>>()
            .chunks(5)
            .map(|c| c.iter().collect())
            .collect()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.record(messages)?;
        Ok(self.response.clone())
    }

    async fn stream(&self, messages: &[Message]) -> Result<TokenStream> {
        self.record(messages)?;

        let mut items: Vec<Result<String>> = self.fragments().into_iter().map(Ok).collect();
        if self.behavior == Behavior::FailMidStream {
            items.truncate(1);
            items.push(Err(AppError::provider("mock", "connection reset")));
        }
        Ok(Box::new(stream::iter(items).boxed()))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

/// Mock factory that hands out clones of scripted clients.
///
/// Clients can be registered per model id; other ids get the default client.
/// Every request is recorded as `(model id, temperature)`.
pub struct MockLLMFactory {
    default: MockLLMClient,
    per_model: HashMap<String, MockLLMClient>,
    requests: Mutex<Vec<(String, f32)>>,
}

impl MockLLMFactory {
    pub fn new(client: MockLLMClient) -> Self {
        Self {
            default: client,
            per_model: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, id: &str, client: MockLLMClient) -> Self {
        self.per_model.insert(id.to_string(), client);
        self
    }

    pub fn requests(&self) -> Vec<(String, f32)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LLMClientFactory for MockLLMFactory {
    async fn create_client(&self, active: &ActiveModel) -> Result<Box<dyn LLMClient>> {
        self.requests
            .lock()
            .push((active.id.clone(), active.params.temperature));
        let client = self
            .per_model
            .get(&active.id)
            .unwrap_or(&self.default)
            .clone();
        Ok(Box::new(client))
    }
}

pub const MOCK_DIMENSIONS: usize = 64;

/// Bag-of-words embeddings: each lowercase word adds one to a hashed bucket.
///
/// Texts that share words score higher under cosine similarity, which is
/// enough to make retrieval outcomes predictable.
#[derive(Default)]
pub struct MockEmbeddings {
    calls: AtomicUsize,
}

impl MockEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of texts embedded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; MOCK_DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % MOCK_DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    fn identity(&self) -> String {
        "mock/embeddings".to_string()
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }
}

/// Embedding provider that is always unavailable.
pub struct FailingEmbeddings;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    fn identity(&self) -> String {
        "mock/embeddings".to_string()
    }

    fn dimensions(&self) -> usize {
        MOCK_DIMENSIONS
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(AppError::embedding("mock", "service unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_streams_in_fragments() {
        let client = MockLLMClient::new("The sky is blue.");
        let fragments: Vec<String> = client
            .stream(&[Message::user("hi")])
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, vec!["The s", "ky is", " blue", "."]);
        assert_eq!(client.log().lock().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_failing() {
        let client = MockLLMClient::failing();
        assert!(client.generate(&[Message::user("hi")]).await.is_err());
    }

    #[test]
    fn test_mock_vectors_share_words() {
        let a = MockEmbeddings::vector("The sky");
        let b = MockEmbeddings::vector("the SKY!");
        assert_eq!(a, b);
    }
}
