//! Embedding providers
//!
//! An [`EmbeddingProvider`] turns text into a fixed-length vector. The
//! provider's [`identity`](EmbeddingProvider::identity) is part of every cache
//! fingerprint and is recorded in the index, so that a query is always
//! embedded by the same model that embedded the chunks.
//!
//! - [`OpenAIEmbeddings`] - `POST {api_base}/embeddings`
//! - [`OllamaEmbeddings`] - `POST {base_url}/api/embed`
//! - `FastEmbedEmbeddings` - local all-MiniLM-L6-v2 (feature `local-embeddings`)

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::types::{AppError, Result};
use crate::utils::retry::{send_with_retry, RetryPolicy};
use crate::utils::toml_config::{EmbeddingConfig, FreestreamConfig};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identity, e.g. `openai/text-embedding-3-small`
    fn identity(&self) -> String;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, in order. Providers with a batch endpoint override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Build the provider named by the configuration.
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config {
        EmbeddingConfig::OpenAI {
            model,
            dimensions,
            api_key_env,
            api_base,
            max_retries,
            timeout_secs,
        } => {
            let api_key = FreestreamConfig::resolve_env(api_key_env)?;
            Ok(Arc::new(OpenAIEmbeddings::new(
                api_key,
                api_base.clone(),
                model.clone(),
                *dimensions,
                RetryPolicy::new(*max_retries),
                Duration::from_secs(*timeout_secs),
            )?))
        }
        EmbeddingConfig::Ollama {
            base_url,
            model,
            dimensions,
            max_retries,
            timeout_secs,
        } => Ok(Arc::new(OllamaEmbeddings::new(
            base_url.clone(),
            model.clone(),
            *dimensions,
            RetryPolicy::new(*max_retries),
            Duration::from_secs(*timeout_secs),
        )?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingConfig::Local => Ok(Arc::new(local::FastEmbedEmbeddings::new()?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingConfig::Local => Err(AppError::Configuration(
            "Local embeddings require the `local-embeddings` feature".to_string(),
        )),
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

fn check_dimensions(identity: &str, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(AppError::Configuration(format!(
            "Embedding provider '{}' returned {} dimensions, expected {}",
            identity,
            vector.len(),
            expected
        )));
    }
    Ok(())
}

// ============ OpenAI ============

pub struct OpenAIEmbeddings {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbeddings {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        dimensions: usize,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            dimensions,
            retry,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let body = serde_json::json!({ "model": self.model, "input": input });

        let response = send_with_retry(self.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await
        .map_err(|e| AppError::embedding(self.identity(), e))?;

        let mut parsed: OpenAIEmbeddingResponse = response.json().await.map_err(|e| {
            AppError::embedding(self.identity(), format!("invalid response: {}", e))
        })?;

        if parsed.data.len() != input.len() {
            return Err(AppError::embedding(
                self.identity(),
                format!(
                    "expected {} embeddings, received {}",
                    input.len(),
                    parsed.data.len()
                ),
            ));
        }

        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        for vector in &vectors {
            check_dimensions(&self.identity(), self.dimensions, vector)?;
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    fn identity(&self) -> String {
        format!("openai/{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::embedding(self.identity(), "empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "Embedding batch");
        self.request(texts).await
    }
}

// ============ Ollama ============

pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbeddings {
    pub fn new(
        base_url: String,
        model: String,
        dimensions: usize,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimensions,
            retry,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    fn identity(&self) -> String {
        format!("ollama/{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({ "model": self.model, "input": text });

        let response = send_with_retry(self.retry, || self.client.post(&url).json(&body))
            .await
            .map_err(|e| AppError::embedding(self.identity(), e))?;

        let parsed: OllamaEmbedResponse = response.json().await.map_err(|e| {
            AppError::embedding(self.identity(), format!("invalid response: {}", e))
        })?;

        let vector = parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::embedding(self.identity(), "empty response"))?;
        check_dimensions(&self.identity(), self.dimensions, &vector)?;
        Ok(vector)
    }
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings")]
mod local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use parking_lot::Mutex;

    const MINILM_DIMENSIONS: usize = 384;

    /// all-MiniLM-L6-v2 running in-process.
    pub struct FastEmbedEmbeddings {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastEmbedEmbeddings {
        pub fn new() -> Result<Self> {
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
            )
            .map_err(|e| AppError::embedding("local/all-MiniLM-L6-v2", e))?;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastEmbedEmbeddings {
        fn identity(&self) -> String {
            "local/all-MiniLM-L6-v2".to_string()
        }

        fn dimensions(&self) -> usize {
            MINILM_DIMENSIONS
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.embed_batch(&[text.to_string()])
                .await?
                .pop()
                .ok_or_else(|| AppError::embedding(self.identity(), "empty response"))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || model.lock().embed(texts, None))
                .await
                .map_err(|e| AppError::Internal(format!("embedding task failed: {}", e)))?
                .map_err(|e| AppError::embedding("local/all-MiniLM-L6-v2", e))
        }
    }
}
