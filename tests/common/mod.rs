//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mocks;

use freestream::rag::embeddings::EmbeddingProvider;
use freestream::utils::toml_config::{FreestreamConfig, RagConfig};
use freestream::{AskEvent, ChatSession, LLMClientFactory, UploadedFile};
use futures::StreamExt;
use std::sync::Arc;

pub const SKY_TEXT: &str = "The sky is blue on a clear day. Sunsets turn the sky orange and red.";
pub const OCEAN_TEXT: &str = "The ocean is deep and salty. Whales and fish live in the ocean.";

/// Default configuration with an in-memory embedding cache.
pub fn test_config() -> FreestreamConfig {
    FreestreamConfig {
        rag: RagConfig {
            cache_path: None,
            ..RagConfig::default()
        },
        ..FreestreamConfig::default()
    }
}

pub fn sky_files() -> Vec<UploadedFile> {
    vec![
        UploadedFile::new("sky.txt", SKY_TEXT),
        UploadedFile::new("ocean.txt", OCEAN_TEXT),
    ]
}

pub async fn session_with(
    config: FreestreamConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    factory: Arc<dyn LLMClientFactory>,
) -> ChatSession {
    ChatSession::builder(config)
        .embedder(embedder)
        .llm_factory(factory)
        .build()
        .await
        .expect("session builds")
}

/// Drain one answer stream, keeping every item.
pub async fn collect_answer(
    session: &mut ChatSession,
    question: &str,
) -> Vec<freestream::Result<AskEvent>> {
    let stream = session.ask(question);
    futures::pin_mut!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

/// Concatenated answer text of a stream's events.
pub fn answer_text(events: &[freestream::Result<AskEvent>]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            Ok(AskEvent::Token(text)) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
