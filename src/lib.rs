//! # FreeStream RAGbot
//!
//! Conversational question answering over your own documents. Upload PDF,
//! Word or plain-text files, then chat with an OpenAI, Anthropic or Gemini
//! model whose answers are grounded in, and cite, the passages retrieved from
//! those files.
//!
//! ## Overview
//!
//! FreeStream can be used in two ways:
//!
//! 1. **As a terminal app** - Run the `freestream` binary
//! 2. **As a library** - Drive a [`ChatSession`] from your own front end
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use freestream::{AskEvent, ChatSession, FreestreamConfig, UploadedFile};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> freestream::Result<()> {
//!     let config = FreestreamConfig::load_or_default("freestream.toml")?;
//!     let mut session = ChatSession::new(config).await?;
//!
//!     session
//!         .upload_documents(vec![UploadedFile::from_path("report.pdf")?])
//!         .await?;
//!     session.select_model("Claude: Haiku")?;
//!
//!     let answer = session.ask("What is the deadline?");
//!     futures::pin_mut!(answer);
//!     while let Some(event) = answer.next().await {
//!         match event? {
//!             AskEvent::Citations(sources) => println!("{} sources", sources.len()),
//!             AskEvent::Token(text) => print!("{}", text),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-embeddings` | In-process all-MiniLM-L6-v2 embeddings via fastembed |
//!
//! ## Modules
//!
//! - [`chat`] - Sessions and the retrieve-then-generate orchestrator
//! - [`llm`] - Chat model clients and the model catalogue
//! - [`loader`] - Document parsing (PDF, Word, text)
//! - [`memory`] - Conversation history
//! - [`rag`] - Chunking, embeddings, caching, indexing and retrieval
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and HTTP retry helpers

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Chat sessions and question answering.
pub mod chat;
/// LLM provider clients and abstractions.
pub mod llm;
/// Document loading and text extraction.
pub mod loader;
/// Conversation memory.
pub mod memory;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Core types (messages, turns, errors).
pub mod types;
/// Configuration and HTTP utilities.
pub mod utils;

// Re-export commonly used types
pub use chat::{AskEvent, ChatSession, SessionBuilder, SessionState, UploadReport};
pub use llm::{HttpClientFactory, LLMClient, LLMClientFactory, ModelRegistry, Provider};
pub use loader::{DocumentLoader, UploadedFile};
pub use types::{AppError, Result};
pub use utils::toml_config::FreestreamConfig;
