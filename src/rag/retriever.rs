//! Query-time retrieval over a [`VectorIndex`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::chunker::Chunk;
use super::embeddings::EmbeddingProvider;
use super::index::{cosine_similarity, ScoredEntry, VectorIndex};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{RagConfig, SearchKind};

/// Number of chunks returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchStrategy {
    /// Plain top-k by cosine similarity
    Similarity,
    /// Maximal marginal relevance over the `fetch_k` most similar chunks
    Mmr { fetch_k: usize, lambda: f32 },
}

impl SearchStrategy {
    pub fn from_config(config: &RagConfig) -> Self {
        match config.search {
            SearchKind::Similarity => SearchStrategy::Similarity,
            SearchKind::Mmr => SearchStrategy::Mmr {
                fetch_k: config.fetch_k,
                lambda: config.mmr_lambda,
            },
        }
    }
}

/// Citation metadata linking an answer back to its source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based marker used in the prompt, e.g. `[1]`
    pub marker: usize,
    pub document_id: Uuid,
    pub filename: String,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub score: f32,
    /// The retrieved passage
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub citation: Citation,
}

/// Retrieved chunks, most relevant first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn citations(&self) -> Vec<Citation> {
        self.chunks.iter().map(|c| c.citation.clone()).collect()
    }
}

pub struct Retriever {
    index: VectorIndex,
    provider: Arc<dyn EmbeddingProvider>,
    strategy: SearchStrategy,
}

impl Retriever {
    /// Pair an index with the provider used for queries.
    ///
    /// Fails if the provider is not the one that built the index.
    pub fn new(index: VectorIndex, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if provider.identity() != index.embedder() {
            return Err(AppError::Configuration(format!(
                "Index was built with '{}' but queries would use '{}'",
                index.embedder(),
                provider.identity()
            )));
        }
        if provider.dimensions() != index.dimensions() {
            return Err(AppError::Configuration(format!(
                "Embedding provider produces {} dimensions, index expects {}",
                provider.dimensions(),
                index.dimensions()
            )));
        }
        Ok(Self {
            index,
            provider,
            strategy: SearchStrategy::Similarity,
        })
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 || self.index.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query_vector = self.provider.embed(query).await?;
        let selected = match self.strategy {
            SearchStrategy::Similarity => self.index.search(&query_vector, k)?,
            SearchStrategy::Mmr { fetch_k, lambda } => {
                let candidates = self.index.search(&query_vector, fetch_k.max(k))?;
                maximal_marginal_relevance(&self.index, &candidates, k, lambda)
            }
        };

        debug!(k, returned = selected.len(), "Retrieved chunks");
        Ok(self.assemble(selected))
    }

    fn assemble(&self, selected: Vec<ScoredEntry>) -> RetrievalResult {
        let chunks = selected
            .into_iter()
            .filter_map(|entry| {
                self.index
                    .get(entry.position)
                    .map(|indexed| (entry.score, indexed.chunk.clone()))
            })
            .enumerate()
            .map(|(i, (score, chunk))| RetrievedChunk {
                citation: Citation {
                    marker: i + 1,
                    document_id: chunk.source.document_id,
                    filename: chunk.source.filename.clone(),
                    chunk_index: chunk.index,
                    start: chunk.source.start,
                    end: chunk.source.end,
                    score,
                    excerpt: chunk.text.clone(),
                },
                chunk,
                score,
            })
            .collect();
        RetrievalResult { chunks }
    }
}

/// Greedy MMR selection. `candidates` must be ranked best first.
fn maximal_marginal_relevance(
    index: &VectorIndex,
    candidates: &[ScoredEntry],
    k: usize,
    lambda: f32,
) -> Vec<ScoredEntry> {
    let mut remaining: Vec<ScoredEntry> = candidates.to_vec();
    let mut picked: Vec<ScoredEntry> = Vec::with_capacity(k);

    while picked.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (i, candidate) in remaining.iter().enumerate() {
            let redundancy = picked
                .iter()
                .filter_map(|p| {
                    let a = index.get(p.position)?;
                    let b = index.get(candidate.position)?;
                    Some(cosine_similarity(&a.vector, &b.vector))
                })
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if picked.is_empty() { 0.0 } else { redundancy };
            let value = lambda * candidate.score - (1.0 - lambda) * redundancy;

            let better = match best {
                None => true,
                Some((best_i, best_value)) => match value.partial_cmp(&best_value) {
                    Some(Ordering::Greater) => true,
                    Some(Ordering::Equal) => candidate.position < remaining[best_i].position,
                    _ => false,
                },
            };
            if better {
                best = Some((i, value));
            }
        }

        match best {
            Some((i, _)) => picked.push(remaining.remove(i)),
            None => break,
        }
    }

    picked
}
