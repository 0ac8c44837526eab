//! One user's chat session: uploads, model selection and the conversation.

use futures::Stream;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::orchestrator::{AskEvent, RagOrchestrator, SessionState};
use crate::llm::{HttpClientFactory, LLMClientFactory, ModelRegistry};
use crate::loader::{DocumentLoader, FileKind, UploadedFile};
use crate::rag::cache::{CacheStats, EmbeddingCache, NoOpCache, PersistentEmbeddingCache};
use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::{create_embedding_provider, EmbeddingProvider};
use crate::rag::index::IndexBuilder;
use crate::rag::retriever::{Retriever, SearchStrategy};
use crate::types::{AppError, Result, Turn};
use crate::utils::toml_config::{FreestreamConfig, ModelConfig, RagConfig};

/// A document that made it into the index
#[derive(Debug, Clone, Serialize)]
pub struct LoadedDocument {
    pub id: Uuid,
    pub filename: String,
    pub kind: FileKind,
    pub chars: usize,
}

/// Outcome of [`ChatSession::upload_documents`]
#[derive(Debug)]
pub struct UploadReport {
    /// Indexed documents, in upload order
    pub documents: Vec<LoadedDocument>,
    /// Files that could not be parsed
    pub failures: Vec<AppError>,
    pub chunks: usize,
    /// Embedding cache counters after the build
    pub cache: CacheStats,
}

/// Builder for [`ChatSession`]; components default to what configuration names.
pub struct SessionBuilder {
    config: FreestreamConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    cache: Option<Arc<PersistentEmbeddingCache>>,
    factory: Option<Arc<dyn LLMClientFactory>>,
}

impl SessionBuilder {
    pub fn new(config: FreestreamConfig) -> Self {
        Self {
            config,
            embedder: None,
            cache: None,
            factory: None,
        }
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn cache(mut self, cache: Arc<PersistentEmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn llm_factory(mut self, factory: Arc<dyn LLMClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub async fn build(self) -> Result<ChatSession> {
        let rag = self.config.rag.clone();
        let chunker = TextChunker::new(rag.chunk_size, rag.chunk_overlap)?;

        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => create_embedding_provider(&self.config.embedding)?,
        };

        let persistent = match self.cache {
            Some(cache) => Some(cache),
            None if rag.cache_enabled => Some(Arc::new(match rag.cache_path {
                Some(ref path) => PersistentEmbeddingCache::open(path).await?,
                None => PersistentEmbeddingCache::in_memory(),
            })),
            None => None,
        };
        let cache: Arc<dyn EmbeddingCache> = match persistent {
            Some(ref cache) => cache.clone() as Arc<dyn EmbeddingCache>,
            None => Arc::new(NoOpCache),
        };

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(HttpClientFactory) as Arc<dyn LLMClientFactory>);
        let registry = ModelRegistry::from_config(&self.config)?;
        let orchestrator = RagOrchestrator::new(registry, factory, rag.top_k)
            .with_condense_question(rag.condense_question);

        info!(
            embedder = %embedder.identity(),
            model = %orchestrator.registry().active_id(),
            cache = cache.is_enabled(),
            "Chat session ready"
        );

        Ok(ChatSession {
            rag,
            loader: DocumentLoader::new(),
            chunker,
            embedder,
            cache,
            persistent,
            orchestrator,
        })
    }
}

pub struct ChatSession {
    rag: RagConfig,
    loader: DocumentLoader,
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn EmbeddingCache>,
    persistent: Option<Arc<PersistentEmbeddingCache>>,
    orchestrator: RagOrchestrator,
}

impl ChatSession {
    /// Session with every component built from configuration
    pub async fn new(config: FreestreamConfig) -> Result<Self> {
        SessionBuilder::new(config).build().await
    }

    pub fn builder(config: FreestreamConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Parse, chunk and index `files`, replacing any previous index.
    ///
    /// Files that fail to parse are reported and skipped. If none parse, the
    /// first parse error is returned. A failed index build keeps the
    /// previous index.
    pub async fn upload_documents(&mut self, files: Vec<UploadedFile>) -> Result<UploadReport> {
        if files.is_empty() {
            return Err(AppError::Validation("No files to upload".to_string()));
        }

        let loader = self.loader;
        let results = tokio::task::spawn_blocking(move || loader.load_all(files))
            .await
            .map_err(|e| AppError::Internal(format!("Document loading task failed: {}", e)))?;

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(document) => documents.push(document),
                Err(e) => failures.push(e),
            }
        }

        if documents.is_empty() {
            return Err(failures
                .into_iter()
                .next()
                .unwrap_or_else(|| AppError::Internal("No documents loaded".to_string())));
        }

        let chunks = self.chunker.chunk_all(&documents);
        let chunk_count = chunks.len();

        let index = IndexBuilder::new(self.embedder.clone(), self.cache.clone())
            .with_concurrency(self.rag.embedding_concurrency)
            .with_batch_size(self.rag.embedding_batch_size)
            .build(chunks)
            .await
            .inspect_err(|e| warn!(error = %e, "Index build failed, keeping previous index"))?;

        let retriever = Retriever::new(index, self.embedder.clone())?
            .with_strategy(SearchStrategy::from_config(&self.rag));
        self.orchestrator.set_retriever(retriever);

        let documents: Vec<LoadedDocument> = documents
            .into_iter()
            .map(|d| LoadedDocument {
                id: d.id,
                chars: d.text.chars().count(),
                filename: d.filename,
                kind: d.kind,
            })
            .collect();

        info!(
            documents = documents.len(),
            failed = failures.len(),
            chunks = chunk_count,
            "Documents indexed"
        );

        Ok(UploadReport {
            documents,
            failures,
            chunks: chunk_count,
            cache: self.cache.stats(),
        })
    }

    pub fn select_model(&mut self, id: &str) -> Result<&ModelConfig> {
        self.orchestrator.registry_mut().select(id)
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        self.orchestrator.registry_mut().set_temperature(temperature)
    }

    pub fn temperature(&self) -> f32 {
        self.orchestrator.registry().temperature()
    }

    /// Ask a question about the uploaded documents.
    ///
    /// See [`RagOrchestrator::ask`] for the event order.
    pub fn ask<'a>(&'a mut self, query: &'a str) -> impl Stream<Item = Result<AskEvent>> + Send + 'a {
        self.orchestrator.ask(query)
    }

    pub fn clear_history(&mut self) {
        self.orchestrator.clear_history();
    }

    pub fn models(&self) -> &[ModelConfig] {
        self.orchestrator.registry().models()
    }

    pub fn active_model(&self) -> &ModelConfig {
        self.orchestrator.registry().active_config()
    }

    pub fn state(&self) -> SessionState {
        self.orchestrator.state()
    }

    pub fn history(&self) -> &[Turn] {
        self.orchestrator.memory().history()
    }

    /// Whether documents have been indexed
    pub fn has_documents(&self) -> bool {
        self.orchestrator.retriever().is_some()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Write the embedding cache to disk, if it has a file.
    pub async fn persist_cache(&self) -> Result<()> {
        match self.persistent {
            Some(ref cache) => cache.persist().await,
            None => Ok(()),
        }
    }
}
