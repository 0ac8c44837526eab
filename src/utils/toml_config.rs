//! TOML-based configuration for FreeStream
//!
//! Declares logging, chunking/retrieval parameters, the embedding provider,
//! LLM providers and the model catalogue in a single file (`freestream.toml`).
//! Every section has defaults, so an empty file (or no file at all) yields the
//! stock catalogue: GPT-3.5 Turbo, Claude Haiku, Claude Sonnet and Gemini-Pro.
//!
//! Secrets are never stored in the file. Providers name the environment
//! variable holding their API key, resolved when a client is created.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::AppError;

/// Root configuration structure loaded from freestream.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreestreamConfig {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Named LLM provider configurations
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    /// Model catalogue in display order
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for FreestreamConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            rag: RagConfig::default(),
            embedding: EmbeddingConfig::default(),
            providers: default_providers(),
            models: default_models(),
            session: SessionConfig::default(),
        }
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= RAG Configuration =============

/// How the retriever ranks candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Similarity,
    Mmr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub search: SearchKind,

    /// Candidate pool for MMR
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,

    /// MMR trade-off between relevance (1.0) and diversity (0.0)
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,

    /// Rewrite follow-up questions into standalone ones before retrieval
    #[serde(default)]
    pub condense_question: bool,

    /// Concurrent embedding requests while indexing
    #[serde(default = "default_embedding_concurrency")]
    pub embedding_concurrency: usize,

    /// Chunks sent per embedding request while indexing
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,

    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Where the embedding cache is persisted; unset keeps it in memory
    #[serde(default = "default_cache_path")]
    pub cache_path: Option<PathBuf>,
}

fn default_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    4
}

fn default_fetch_k() -> usize {
    20
}

fn default_mmr_lambda() -> f32 {
    0.5
}

fn default_embedding_concurrency() -> usize {
    4
}

fn default_embedding_batch_size() -> usize {
    32
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> Option<PathBuf> {
    Some(PathBuf::from(".freestream/embeddings.json"))
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            search: SearchKind::default(),
            fetch_k: default_fetch_k(),
            mmr_lambda: default_mmr_lambda(),
            condense_question: false,
            embedding_concurrency: default_embedding_concurrency(),
            embedding_batch_size: default_embedding_batch_size(),
            cache_enabled: default_cache_enabled(),
            cache_path: default_cache_path(),
        }
    }
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    /// OpenAI `/v1/embeddings`
    OpenAI {
        #[serde(default = "default_openai_embedding_model")]
        model: String,
        #[serde(default = "default_openai_embedding_dims")]
        dimensions: usize,
        #[serde(default = "default_openai_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_api_base")]
        api_base: String,
        #[serde(default = "default_embedding_retries")]
        max_retries: u32,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Ollama `/api/embed`
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
        dimensions: usize,
        #[serde(default = "default_embedding_retries")]
        max_retries: u32,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// all-MiniLM-L6-v2 via fastembed (requires the `local-embeddings` feature)
    Local,
}

fn default_openai_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_embedding_dims() -> usize {
    1536
}

fn default_embedding_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::OpenAI {
            model: default_openai_embedding_model(),
            dimensions: default_openai_embedding_dims(),
            api_key_env: default_openai_api_key_env(),
            api_base: default_openai_api_base(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        #[serde(default = "default_openai_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_api_base")]
        api_base: String,
    },
    Anthropic {
        #[serde(default = "default_anthropic_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_anthropic_api_base")]
        api_base: String,
    },
    Gemini {
        #[serde(default = "default_gemini_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_gemini_api_base")]
        api_base: String,
    },
}

impl ProviderConfig {
    pub fn api_key_env(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { api_key_env, .. }
            | ProviderConfig::Anthropic { api_key_env, .. }
            | ProviderConfig::Gemini { api_key_env, .. } => api_key_env,
        }
    }

    pub fn api_base(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { api_base, .. }
            | ProviderConfig::Anthropic { api_base, .. }
            | ProviderConfig::Gemini { api_base, .. } => api_base,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::OpenAI { .. } => "openai",
            ProviderConfig::Anthropic { .. } => "anthropic",
            ProviderConfig::Gemini { .. } => "gemini",
        }
    }
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    HashMap::from([
        (
            "openai".to_string(),
            ProviderConfig::OpenAI {
                api_key_env: default_openai_api_key_env(),
                api_base: default_openai_api_base(),
            },
        ),
        (
            "anthropic".to_string(),
            ProviderConfig::Anthropic {
                api_key_env: default_anthropic_api_key_env(),
                api_base: default_anthropic_api_base(),
            },
        ),
        (
            "gemini".to_string(),
            ProviderConfig::Gemini {
                api_key_env: default_gemini_api_key_env(),
                api_base: default_gemini_api_base(),
            },
        ),
    ])
}

// ============= Model Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Display name, used to select the model
    pub id: String,

    /// Key into `providers`
    pub provider: String,

    /// Model name sent to the provider API
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_model_retries")]
    pub max_retries: u32,

    /// Whether partial output is streamed as it is generated
    #[serde(default = "default_streaming")]
    pub streaming: bool,

    #[serde(default)]
    pub top_k: Option<u32>,

    #[serde(default)]
    pub top_p: Option<f32>,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_model_retries() -> u32 {
    1
}

fn default_streaming() -> bool {
    true
}

impl ModelConfig {
    pub fn new(id: &str, provider: &str, model: &str) -> Self {
        Self {
            id: id.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            max_tokens: default_max_tokens(),
            max_retries: default_model_retries(),
            streaming: default_streaming(),
            top_k: None,
            top_p: None,
        }
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("GPT-3.5 Turbo", "openai", "gpt-3.5-turbo-0125"),
        ModelConfig::new("Claude: Haiku", "anthropic", "claude-3-haiku-20240307"),
        ModelConfig::new("Claude: Sonnet", "anthropic", "claude-3-sonnet-20240229"),
        ModelConfig {
            streaming: false,
            top_k: Some(50),
            top_p: Some(0.7),
            ..ModelConfig::new("Gemini-Pro", "gemini", "gemini-pro")
        },
    ]
}

// ============= Session Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Initially active model; the first catalogue entry when unset
    #[serde(default)]
    pub default_model: Option<String>,

    /// Initial sampling temperature, 0.0 to 1.0
    #[serde(default)]
    pub temperature: f32,
}

// ============= Errors =============

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' does not exist")]
    MissingModel(String),

    #[error("Model '{0}' is declared more than once")]
    DuplicateModel(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl FreestreamConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = ?path, models = config.models.len(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(&path) {
            Err(ConfigError::FileNotFound(path)) => {
                warn!(path = ?path, "Configuration file not found, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FreestreamConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate internal consistency. API keys are checked later, per model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than zero".to_string(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be greater than zero".to_string(),
            ));
        }
        if rag.search == SearchKind::Mmr && rag.fetch_k < rag.top_k {
            return Err(ConfigError::ValidationError(format!(
                "rag.fetch_k ({}) must be at least rag.top_k ({})",
                rag.fetch_k, rag.top_k
            )));
        }
        if !(0.0..=1.0).contains(&rag.mmr_lambda) {
            return Err(ConfigError::ValidationError(format!(
                "rag.mmr_lambda must be between 0 and 1, got {}",
                rag.mmr_lambda
            )));
        }
        if rag.embedding_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "rag.embedding_concurrency must be greater than zero".to_string(),
            ));
        }
        if rag.embedding_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.embedding_batch_size must be greater than zero".to_string(),
            ));
        }

        match &self.embedding {
            EmbeddingConfig::OpenAI { dimensions, .. }
            | EmbeddingConfig::Ollama { dimensions, .. }
                if *dimensions == 0 =>
            {
                return Err(ConfigError::ValidationError(
                    "embedding.dimensions must be greater than zero".to_string(),
                ));
            }
            _ => {}
        }

        if !(0.0..=1.0).contains(&self.session.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "session.temperature must be between 0 and 1, got {}",
                self.session.temperature
            )));
        }

        if self.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one model must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.id.as_str()) {
                return Err(ConfigError::DuplicateModel(model.id.clone()));
            }
            if !self.providers.contains_key(&model.provider) {
                return Err(ConfigError::MissingProvider(
                    model.provider.clone(),
                    model.id.clone(),
                ));
            }
            if model.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}' must allow at least one output token",
                    model.id
                )));
            }
            if let Some(top_p) = model.top_p {
                if !(0.0..=1.0).contains(&top_p) {
                    return Err(ConfigError::ValidationError(format!(
                        "model '{}' top_p must be between 0 and 1",
                        model.id
                    )));
                }
            }
        }

        if let Some(ref default) = self.session.default_model {
            if !seen.contains(default.as_str()) {
                return Err(ConfigError::MissingModel(default.clone()));
            }
        }

        Ok(())
    }

    pub fn get_model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(env_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[log]
level = "debug"
format = "json"

[rag]
chunk_size = 800
chunk_overlap = 100
top_k = 3
search = "mmr"
fetch_k = 10
mmr_lambda = 0.7
condense_question = true

[embedding]
type = "ollama"
base_url = "http://localhost:11434"
model = "nomic-embed-text"
dimensions = 768

[providers.openai]
type = "openai"
api_key_env = "TEST_OPENAI_KEY"

[providers.google]
type = "gemini"

[[models]]
id = "GPT-3.5 Turbo"
provider = "openai"
model = "gpt-3.5-turbo-0125"

[[models]]
id = "Gemini-Pro"
provider = "google"
model = "gemini-pro"
streaming = false
top_k = 50
top_p = 0.7

[session]
default_model = "Gemini-Pro"
temperature = 0.25
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config = FreestreamConfig::from_toml(&create_test_config()).unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.rag.chunk_size, 800);
        assert_eq!(config.rag.search, SearchKind::Mmr);
        assert!(config.rag.condense_question);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].id, "GPT-3.5 Turbo");
        assert_eq!(config.models[0].max_tokens, 4096);
        assert!(config.models[0].streaming);
        assert!(!config.models[1].streaming);
        assert_eq!(config.models[1].top_k, Some(50));
        assert_eq!(config.session.default_model.as_deref(), Some("Gemini-Pro"));

        match &config.embedding {
            EmbeddingConfig::Ollama {
                model, dimensions, ..
            } => {
                assert_eq!(model, "nomic-embed-text");
                assert_eq!(*dimensions, 768);
            }
            other => panic!("unexpected embedding config: {other:?}"),
        }

        let google = config.get_provider("google").unwrap();
        assert_eq!(google.kind(), "gemini");
        assert_eq!(google.api_key_env(), "GOOGLE_API_KEY");
        assert_eq!(
            google.api_base(),
            "https://generativelanguage.googleapis.com"
        );
    }

    #[test]
    fn test_empty_file_uses_stock_catalogue() {
        let config = FreestreamConfig::from_toml("").unwrap();

        let ids: Vec<&str> = config.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["GPT-3.5 Turbo", "Claude: Haiku", "Claude: Sonnet", "Gemini-Pro"]
        );
        let gemini = config.get_model("Gemini-Pro").unwrap();
        assert!(!gemini.streaming);
        assert_eq!(gemini.top_p, Some(0.7));
        assert_eq!(config.rag.chunk_size, 1500);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.session.temperature, 0.0);
        assert!(matches!(config.embedding, EmbeddingConfig::OpenAI { .. }));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = FreestreamConfig::from_toml("[rag]\nchunk_size = 100\nchunk_overlap = 100\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_temperature_out_of_range() {
        let err = FreestreamConfig::from_toml("[session]\ntemperature = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_missing_provider_reference() {
        let toml = r#"
[[models]]
id = "Mystery"
provider = "nowhere"
model = "m"
"#;
        let err = FreestreamConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingProvider(ref p, ref m) if p == "nowhere" && m == "Mystery"));
    }

    #[test]
    fn test_duplicate_model_ids() {
        let toml = r#"
[[models]]
id = "Twin"
provider = "openai"
model = "a"

[[models]]
id = "Twin"
provider = "openai"
model = "b"
"#;
        let err = FreestreamConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModel(_)));
    }

    #[test]
    fn test_unknown_default_model() {
        let err = FreestreamConfig::from_toml("[session]\ndefault_model = \"GPT-9\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingModel(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = FreestreamConfig::load("/nonexistent/freestream.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));

        let config = FreestreamConfig::load_or_default("/nonexistent/freestream.toml").unwrap();
        assert_eq!(config.models.len(), 4);
    }

    #[test]
    fn test_resolve_env_missing() {
        let err = FreestreamConfig::resolve_env("FREESTREAM_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }
}
