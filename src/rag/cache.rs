//! Embedding Cache for the RAG Pipeline
//!
//! Caches chunk vectors so that re-uploading the same documents, or restarting
//! with a persisted cache, does not call the embedding provider again.
//!
//! # Cache Key Strategy
//!
//! Keys are SHA-256 fingerprints of `provider identity + NUL + text`:
//! - identical text embedded by different providers never collides
//! - keys are stable across restarts, so the cache can be persisted
//!
//! # Concurrency
//!
//! Sessions may share one cache. Insertion is atomic per fingerprint and the
//! first writer wins; a later insert for an existing key is ignored.
//!
//! # Example
//!
//! ```ignore
//! use freestream::rag::cache::{compute_key, EmbeddingCache, PersistentEmbeddingCache};
//!
//! let cache = PersistentEmbeddingCache::open(".freestream/embeddings.json").await?;
//! let key = compute_key("hello world", "openai/text-embedding-3-small");
//! if cache.get(&key).is_none() {
//!     cache.insert_if_absent(&key, embed("hello world").await?);
//! }
//! cache.persist().await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::types::{AppError, Result};

/// On-disk format version.
const CACHE_FILE_VERSION: u32 = 1;

// ============================================================================
// Cache Types
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries in cache
    pub entry_count: usize,
    /// Inserts ignored because the fingerprint was already present
    pub duplicate_inserts: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Compute the cache fingerprint for a chunk text and embedding provider identity.
pub fn compute_key(text: &str, provider_identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider_identity.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// Cache Trait
// ============================================================================

/// Trait for embedding cache implementations
pub trait EmbeddingCache: Send + Sync {
    /// Get an embedding from the cache
    fn get(&self, key: &str) -> Option<Vec<f32>>;

    /// Store an embedding unless the key is already present.
    ///
    /// Returns `true` if this call stored the vector.
    fn insert_if_absent(&self, key: &str, embedding: Vec<f32>) -> bool;

    /// Get cache statistics
    fn stats(&self) -> CacheStats;

    /// Check if the cache is enabled
    fn is_enabled(&self) -> bool;
}

// ============================================================================
// Persistent Embedding Cache
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, Vec<f32>>,
}

/// In-memory fingerprint cache, optionally backed by a JSON file.
///
/// Thread-safe via `parking_lot::RwLock`. Nothing touches the disk until
/// [`persist`](Self::persist) is called.
pub struct PersistentEmbeddingCache {
    entries: RwLock<HashMap<String, Vec<f32>>>,
    path: Option<PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
    duplicate_inserts: AtomicU64,
}

impl PersistentEmbeddingCache {
    /// A cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_entries(HashMap::new(), None)
    }

    /// Open a cache file. A missing file yields an empty cache bound to `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !tokio::fs::try_exists(&path).await? {
            debug!(path = ?path, "No embedding cache on disk, starting empty");
            return Ok(Self::with_entries(HashMap::new(), Some(path)));
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let file: CacheFile = serde_json::from_str(&raw).map_err(|e| {
            AppError::Configuration(format!(
                "Embedding cache {} is corrupt: {}",
                path.display(),
                e
            ))
        })?;

        if file.version != CACHE_FILE_VERSION {
            return Err(AppError::Configuration(format!(
                "Embedding cache {} has unsupported version {}",
                path.display(),
                file.version
            )));
        }

        info!(path = ?path, entries = file.entries.len(), "Loaded embedding cache");
        Ok(Self::with_entries(
            file.entries.into_iter().collect(),
            Some(path),
        ))
    }

    fn with_entries(entries: HashMap<String, Vec<f32>>, path: Option<PathBuf>) -> Self {
        Self {
            entries: RwLock::new(entries),
            path,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            duplicate_inserts: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Write the cache to its file, replacing it atomically.
    ///
    /// A no-op for in-memory caches.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        let file = CacheFile {
            version: CACHE_FILE_VERSION,
            entries: self
                .entries
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| AppError::Internal(format!("Failed to serialize cache: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        info!(path = ?path, entries = file.entries.len(), "Saved embedding cache");
        Ok(())
    }
}

impl EmbeddingCache for PersistentEmbeddingCache {
    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let hit = self.entries.read().get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert_if_absent(&self, key: &str, embedding: Vec<f32>) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            self.duplicate_inserts.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        entries.insert(key.to_string(), embedding);
        true
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len(),
            duplicate_inserts: self.duplicate_inserts.load(Ordering::Relaxed),
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

// ============================================================================
// No-Op Cache
// ============================================================================

/// A cache that stores nothing, used when caching is disabled.
#[derive(Debug, Default)]
pub struct NoOpCache;

impl EmbeddingCache for NoOpCache {
    fn get(&self, _key: &str) -> Option<Vec<f32>> {
        None
    }

    fn insert_if_absent(&self, _key: &str, _embedding: Vec<f32>) -> bool {
        false
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// ============================================================================
// Tests
// ============================================================================
