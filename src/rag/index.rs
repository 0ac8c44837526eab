//! Vector index over document chunks.
//!
//! The index is an exact, brute-force cosine-similarity store: every query is
//! scored against every chunk. Rankings are fully deterministic because equal
//! scores are ordered by chunk insertion order.
//!
//! Building is all-or-nothing. Vectors computed during a build reach the
//! cache only after every chunk has one, so a failed build leaves neither a
//! partial index nor partial cache entries behind.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use super::cache::{compute_key, EmbeddingCache};
use super::chunker::Chunk;
use super::embeddings::EmbeddingProvider;
use crate::types::{AppError, Result};

/// Cosine similarity in `[-1, 1]`; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A scored position in the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredEntry {
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
    embedder: String,
}

impl VectorIndex {
    pub fn new(embedder: impl Into<String>, dimensions: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimensions,
            embedder: embedder.into(),
        }
    }

    /// Append a chunk; its position is its insertion order.
    pub fn push(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::Configuration(format!(
                "Vector for chunk {} of '{}' has {} dimensions, index expects {}",
                chunk.index,
                chunk.source.filename,
                vector.len(),
                self.dimensions
            )));
        }
        self.entries.push(IndexedChunk { chunk, vector });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Identity of the embedding provider that produced the vectors.
    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn get(&self, position: usize) -> Option<&IndexedChunk> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[IndexedChunk] {
        &self.entries
    }

    /// Score every entry against `query`, best first, ties by insertion order.
    pub fn rank(&self, query: &[f32]) -> Result<Vec<ScoredEntry>> {
        if query.len() != self.dimensions {
            return Err(AppError::Configuration(format!(
                "Query vector has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<ScoredEntry> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| ScoredEntry {
                position,
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        Ok(scored)
    }

    /// The `k` best entries for `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let mut ranked = self.rank(query)?;
        ranked.truncate(k);
        Ok(ranked)
    }
}

/// Embeds chunks (through the cache) and assembles a [`VectorIndex`].
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn EmbeddingCache>,
    concurrency: usize,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<dyn EmbeddingCache>) -> Self {
        Self {
            provider,
            cache,
            concurrency: 4,
            batch_size: 32,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Number of chunk texts sent per `embed_batch` call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<VectorIndex> {
        if chunks.is_empty() {
            return Err(AppError::Configuration(
                "No text to index; upload at least one non-empty document".to_string(),
            ));
        }

        let identity = self.provider.identity();
        let dimensions = self.provider.dimensions();

        let keys: Vec<String> = chunks
            .iter()
            .map(|chunk| compute_key(&chunk.text, &identity))
            .collect();
        let cached: Vec<Option<Vec<f32>>> = keys.iter().map(|key| self.cache.get(key)).collect();

        let misses: Vec<usize> = cached
            .iter()
            .enumerate()
            .filter(|(_, hit)| hit.is_none())
            .map(|(i, _)| i)
            .collect();

        debug!(
            chunks = chunks.len(),
            cache_hits = chunks.len() - misses.len(),
            embedder = %identity,
            "Embedding chunks"
        );

        // `buffered` keeps batches in input order regardless of completion order.
        let provider = &self.provider;
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(misses.chunks(self.batch_size))
            .map(|batch| {
                let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
                async move {
                    let vectors = provider.embed_batch(&texts).await?;
                    if vectors.len() != texts.len() {
                        return Err(AppError::embedding(
                            provider.identity(),
                            format!(
                                "expected {} embeddings, received {}",
                                texts.len(),
                                vectors.len()
                            ),
                        ));
                    }
                    Ok::<_, AppError>(vectors)
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let computed: Vec<(usize, Vec<f32>)> = misses
            .iter()
            .copied()
            .zip(batches.into_iter().flatten())
            .collect();

        let mut vectors = cached;
        for (i, vector) in computed.iter() {
            vectors[*i] = Some(vector.clone());
        }

        let mut index = VectorIndex::new(identity.as_str(), dimensions);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let vector = vector.ok_or_else(|| {
                AppError::Internal(format!("chunk {} was never embedded", chunk.index))
            })?;
            index.push(chunk, vector)?;
        }

        for (i, vector) in computed {
            self.cache.insert_if_absent(&keys[i], vector);
        }

        info!(
            chunks = index.len(),
            embedded = misses.len(),
            embedder = %identity,
            "Built vector index"
        );
        Ok(index)
    }
}
