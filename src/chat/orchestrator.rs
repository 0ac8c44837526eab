//! Question answering over the indexed documents.
//!
//! One [`RagOrchestrator::ask`] call runs one turn: retrieve, build the prompt,
//! generate, then record the exchange. The returned stream borrows the
//! orchestrator mutably, so a session can only have one turn in flight.

use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::{LLMClientFactory, ModelRegistry};
use crate::memory::ConversationMemory;
use crate::rag::prompt::PromptBuilder;
use crate::rag::retriever::{Citation, Retriever};
use crate::types::{AppError, Result};

/// Returned by `ask` while no documents are indexed.
pub const NO_DOCUMENTS_MESSAGE: &str = "Please upload documents to continue.";

/// One item of an answer stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AskEvent {
    /// Sources backing the answer; always the first event
    Citations(Vec<Citation>),
    /// A fragment of the answer text
    Token(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Retrieving,
    Generating,
    Cleared,
}

/// Returns the shared state to `Idle` when a turn ends, however it ends.
struct TurnGuard {
    state: Arc<RwLock<SessionState>>,
}

impl TurnGuard {
    fn new(state: Arc<RwLock<SessionState>>) -> Self {
        Self { state }
    }

    fn set(&self, next: SessionState) {
        *self.state.write() = next;
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        *self.state.write() = SessionState::Idle;
    }
}

pub struct RagOrchestrator {
    retriever: Option<Retriever>,
    memory: ConversationMemory,
    registry: ModelRegistry,
    factory: Arc<dyn LLMClientFactory>,
    top_k: usize,
    condense_question: bool,
    state: Arc<RwLock<SessionState>>,
}

impl RagOrchestrator {
    pub fn new(registry: ModelRegistry, factory: Arc<dyn LLMClientFactory>, top_k: usize) -> Self {
        Self {
            retriever: None,
            memory: ConversationMemory::new(),
            registry,
            factory,
            top_k,
            condense_question: false,
            state: Arc::new(RwLock::new(SessionState::Idle)),
        }
    }

    /// Rewrite follow-ups into standalone questions before retrieval.
    pub fn with_condense_question(mut self, enabled: bool) -> Self {
        self.condense_question = enabled;
        self
    }

    /// Replace the searchable index.
    pub fn set_retriever(&mut self, retriever: Retriever) {
        self.retriever = Some(retriever);
    }

    pub fn retriever(&self) -> Option<&Retriever> {
        self.retriever.as_ref()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn clear_history(&mut self) {
        *self.state.write() = SessionState::Cleared;
        self.memory.clear();
        info!("Conversation history cleared");
    }

    /// Answer `query` as a stream of events.
    ///
    /// Emits the citations, then the answer as one or more tokens. Any error
    /// is the last item. Memory is only updated once the answer is complete,
    /// so a failed or abandoned turn leaves the history as it was.
    pub fn ask<'a>(&'a mut self, query: &'a str) -> impl Stream<Item = Result<AskEvent>> + Send + 'a {
        async_stream::try_stream! {
            let question = query.trim();
            if question.is_empty() {
                Err::<(), _>(AppError::Validation("Question must not be empty".to_string()))?;
            }

            let retriever = self
                .retriever
                .as_ref()
                .ok_or_else(|| AppError::Configuration(NO_DOCUMENTS_MESSAGE.to_string()))?;

            let guard = TurnGuard::new(self.state.clone());
            let active = self.registry.active()?;
            let client = self.factory.create_client(&active).await?;
            let history = self.memory.history();

            debug!(
                model = %active.id,
                turns = history.len(),
                estimated_tokens = self.memory.estimate_tokens(),
                "Answering question"
            );

            guard.set(SessionState::Retrieving);
            let search_query = if self.condense_question && !history.is_empty() {
                let condensed = client
                    .generate(&PromptBuilder::build_condense_messages(question, history))
                    .await?;
                let condensed = condensed.trim().to_string();
                debug!(condensed = %condensed, "Condensed follow-up question");
                if condensed.is_empty() { question.to_string() } else { condensed }
            } else {
                question.to_string()
            };

            let retrieval = retriever.retrieve(&search_query, self.top_k).await?;
            yield AskEvent::Citations(retrieval.citations());

            let messages = PromptBuilder::build_messages(question, &retrieval, history);
            guard.set(SessionState::Generating);

            let mut answer = String::new();
            if client.supports_streaming() {
                let mut tokens = client.stream(&messages).await?;
                while let Some(token) = tokens.next().await {
                    let token = token?;
                    answer.push_str(&token);
                    yield AskEvent::Token(token);
                }
            } else {
                let text = client.generate(&messages).await?;
                answer.push_str(&text);
                yield AskEvent::Token(text);
            }

            self.memory.append_exchange(question, answer.as_str());
            info!(
                model = %active.id,
                sources = retrieval.len(),
                answer_chars = answer.len(),
                "Answered question"
            );
        }
    }
}
