//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Overlapping fixed-size text windows
//! - [`rag::embeddings`](crate::rag::embeddings) - Embedding providers (OpenAI, Ollama, fastembed)
//! - [`rag::cache`](crate::rag::cache) - Fingerprint-keyed embedding cache with disk persistence
//! - [`rag::index`](crate::rag::index) - Exact cosine-similarity vector index and its builder
//! - [`rag::retriever`](crate::rag::retriever) - Top-k and MMR retrieval with citations
//! - [`rag::prompt`](crate::rag::prompt) - Prompt assembly
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - Documents are chunked and embedded (cache first)
//! 2. **Indexing** - Vectors are stored in insertion order
//! 3. **Retrieval** - The query is embedded by the same provider and ranked
//! 4. **Generation** - The LLM answers with the passages and conversation history
//!
//! # Example
//!
//! ```ignore
//! use freestream::rag::{chunker::TextChunker, index::IndexBuilder, retriever::Retriever};
//!
//! let chunker = TextChunker::new(1500, 200)?;
//! let chunks = chunker.chunk_all(&documents);
//! let index = IndexBuilder::new(provider.clone(), cache).build(chunks).await?;
//!
//! let retriever = Retriever::new(index, provider)?;
//! let result = retriever.retrieve("What color is the sky?", 4).await?;
//! ```

pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod prompt;
pub mod retriever;
