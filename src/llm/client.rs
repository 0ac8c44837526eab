//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the chat-completion providers
//! a session can switch between:
//! - **OpenAI**: Chat Completions API, streaming over SSE
//! - **Anthropic**: Messages API, streaming over SSE
//! - **Gemini**: Generative Language API, single-shot or SSE streaming

use crate::llm::provider_registry::ActiveModel;
use crate::types::{AppError, Message, Result};
use crate::utils::toml_config::{FreestreamConfig, ProviderConfig};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;

/// Incremental output of a streaming generation.
pub type TokenStream = Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing a session to swap models
/// between questions without changing application code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a full completion for a conversation
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Stream a completion as text fragments, in order
    async fn stream(&self, messages: &[Message]) -> Result<TokenStream>;

    /// Whether `stream` yields output incrementally
    fn supports_streaming(&self) -> bool;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;

    /// Short provider name used in errors and logs
    fn provider(&self) -> &str;
}

/// Per-model generation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Retries before the first output token
    pub max_retries: u32,
    pub streaming: bool,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 1,
            streaming: true,
            top_k: None,
            top_p: None,
        }
    }
}

impl ModelParams {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }
}

/// Provider enum for runtime selection, with credentials resolved
///
/// # Example
/// ```rust,ignore
/// let provider = Provider::OpenAI {
///     api_key: "sk-...".to_string(),
///     api_base: "https://api.openai.com/v1".to_string(),
///     model: "gpt-3.5-turbo-0125".to_string(),
///     params: ModelParams::default(),
/// };
/// let client = provider.create_client()?;
/// ```
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (and compatible APIs)
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },

    /// Anthropic Claude Messages API
    Anthropic {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },

    /// Google Gemini via the Generative Language API
    Gemini {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },
}

impl Provider {
    /// Resolve the API key for `active` from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the variable when it is unset.
    pub fn resolve(active: &ActiveModel) -> Result<Self> {
        let env_name = active.provider.api_key_env();
        let api_key = FreestreamConfig::resolve_env(env_name).map_err(|_| {
            AppError::Configuration(format!(
                "Model '{}' needs an API key: set the {} environment variable",
                active.id, env_name
            ))
        })?;

        let api_base = active.provider.api_base().trim_end_matches('/').to_string();
        let model = active.model.clone();
        let params = active.params.clone();

        Ok(match active.provider {
            ProviderConfig::OpenAI { .. } => Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            },
            ProviderConfig::Anthropic { .. } => Provider::Anthropic {
                api_key,
                api_base,
                model,
                params,
            },
            ProviderConfig::Gemini { .. } => Provider::Gemini {
                api_key,
                api_base,
                model,
                params,
            },
        })
    }

    /// Create a client instance for this provider
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params.clone(),
            )?)),

            Provider::Anthropic {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::anthropic::AnthropicClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params.clone(),
            )?)),

            Provider::Gemini {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::gemini::GeminiClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params.clone(),
            )?)),
        }
    }

    /// Get a short name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "openai",
            Provider::Anthropic { .. } => "anthropic",
            Provider::Gemini { .. } => "gemini",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. }
            | Provider::Anthropic { model, .. }
            | Provider::Gemini { model, .. } => model,
        }
    }

    pub fn params(&self) -> &ModelParams {
        match self {
            Provider::OpenAI { params, .. }
            | Provider::Anthropic { params, .. }
            | Provider::Gemini { params, .. } => params,
        }
    }
}

/// Builds a client for the active model on every question.
///
/// The session holds a factory rather than a client so that model and
/// temperature changes take effect on the next question.
#[async_trait]
pub trait LLMClientFactory: Send + Sync {
    async fn create_client(&self, active: &ActiveModel) -> Result<Box<dyn LLMClient>>;
}

/// Factory for the real HTTP providers
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

#[async_trait]
impl LLMClientFactory for HttpClientFactory {
    async fn create_client(&self, active: &ActiveModel) -> Result<Box<dyn LLMClient>> {
        Provider::resolve(active)?.create_client()
    }
}

/// Shared reqwest client setup for all providers.
pub(crate) fn http_client(provider: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| AppError::provider(provider, format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(provider: ProviderConfig) -> ActiveModel {
        ActiveModel {
            id: "Test Model".to_string(),
            provider_name: provider.kind().to_string(),
            provider,
            model: "test-model".to_string(),
            params: ModelParams::default(),
        }
    }

    #[test]
    fn test_missing_key_names_env_var() {
        let config = ProviderConfig::Anthropic {
            api_key_env: "FREESTREAM_TEST_UNSET_ANTHROPIC_KEY".to_string(),
            api_base: "https://api.anthropic.com".to_string(),
        };
        let err = Provider::resolve(&active(config)).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("FREESTREAM_TEST_UNSET_ANTHROPIC_KEY"));
        assert!(err.to_string().contains("Test Model"));
    }

    #[test]
    fn test_resolve_maps_provider_kind() {
        std::env::set_var("FREESTREAM_TEST_GEMINI_KEY", "g-key");
        let config = ProviderConfig::Gemini {
            api_key_env: "FREESTREAM_TEST_GEMINI_KEY".to_string(),
            api_base: "https://generativelanguage.googleapis.com/".to_string(),
        };
        let provider = Provider::resolve(&active(config)).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "test-model");
        match provider {
            Provider::Gemini {
                api_key, api_base, ..
            } => {
                assert_eq!(api_key, "g-key");
                assert_eq!(api_base, "https://generativelanguage.googleapis.com");
            }
            other => panic!("unexpected provider: {other:?}"),
        }
    }

    #[test]
    fn test_create_client_reports_capabilities() {
        let params = ModelParams {
            streaming: false,
            ..ModelParams::default()
        };
        let provider = Provider::Gemini {
            api_key: "k".to_string(),
            api_base: "http://localhost".to_string(),
            model: "gemini-pro".to_string(),
            params,
        };
        let client = provider.create_client().unwrap();
        assert!(!client.supports_streaming());
        assert_eq!(client.model_name(), "gemini-pro");
        assert_eq!(client.provider(), "gemini");
    }
}
