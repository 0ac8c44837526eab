//! Model registry for a chat session
//!
//! Holds the model catalogue in display order, which entry is active, and the
//! session-wide temperature. Selecting a model or changing the temperature
//! touches nothing else: clients are built from [`ActiveModel`] on demand, so
//! an unset API key only surfaces when a question is actually asked.

use crate::llm::client::ModelParams;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{FreestreamConfig, ModelConfig, ProviderConfig};
use std::collections::HashMap;
use tracing::info;

/// Everything needed to build a client for the active model
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveModel {
    /// Catalogue id, e.g. `"Claude: Haiku"`
    pub id: String,
    /// Key of the provider entry in configuration
    pub provider_name: String,
    pub provider: ProviderConfig,
    /// Provider-side model name
    pub model: String,
    pub params: ModelParams,
}

/// Catalogue plus session selection state
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
    providers: HashMap<String, ProviderConfig>,
    active: usize,
    temperature: f32,
}

impl ModelRegistry {
    /// Create a registry from validated configuration
    ///
    /// The initial model is `session.default_model`, or the first catalogue entry.
    pub fn from_config(config: &FreestreamConfig) -> Result<Self> {
        if config.models.is_empty() {
            return Err(AppError::Configuration(
                "At least one model must be configured".to_string(),
            ));
        }
        for model in &config.models {
            if !config.providers.contains_key(&model.provider) {
                return Err(AppError::Configuration(format!(
                    "Provider '{}' referenced by model '{}' not found",
                    model.provider, model.id
                )));
            }
        }

        let active = match config.session.default_model {
            Some(ref id) => config
                .models
                .iter()
                .position(|m| &m.id == id)
                .ok_or_else(|| AppError::Configuration(format!("Model '{}' not found in configuration", id)))?,
            None => 0,
        };

        let mut registry = Self {
            models: config.models.clone(),
            providers: config.providers.clone(),
            active,
            temperature: 0.0,
        };
        registry.set_temperature(config.session.temperature)?;
        Ok(registry)
    }

    /// All models in display order
    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn model_ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn get_model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Mark `id` as the active model
    ///
    /// # Errors
    ///
    /// Returns a validation error for an id not in the catalogue; the current
    /// selection is left unchanged.
    pub fn select(&mut self, id: &str) -> Result<&ModelConfig> {
        let position = self.models.iter().position(|m| m.id == id).ok_or_else(|| {
            AppError::Validation(format!(
                "Unknown model '{}'. Available: {}",
                id,
                self.model_ids().join(", ")
            ))
        })?;

        self.active = position;
        info!(model = %id, "Model selected");
        Ok(&self.models[position])
    }

    pub fn active_config(&self) -> &ModelConfig {
        &self.models[self.active]
    }

    pub fn active_id(&self) -> &str {
        &self.active_config().id
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Set the session-wide temperature, applied to whichever model is active
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(AppError::Validation(format!(
                "Temperature must be between 0 and 1, got {}",
                temperature
            )));
        }
        self.temperature = temperature;
        Ok(())
    }

    /// Resolve the active entry for client construction
    pub fn active(&self) -> Result<ActiveModel> {
        let model = self.active_config();
        let provider = self.providers.get(&model.provider).ok_or_else(|| {
            AppError::Configuration(format!(
                "Provider '{}' referenced by model '{}' not found",
                model.provider, model.id
            ))
        })?;

        Ok(ActiveModel {
            id: model.id.clone(),
            provider_name: model.provider.clone(),
            provider: provider.clone(),
            model: model.model.clone(),
            params: ModelParams {
                temperature: self.temperature,
                max_tokens: model.max_tokens,
                max_retries: model.max_retries,
                streaming: model.streaming,
                top_k: model.top_k,
                top_p: model.top_p,
            },
        })
    }
}
