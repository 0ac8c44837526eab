use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Conversation Types =============

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ============= LLM Message Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

/// A message sent to an LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            content: turn.content.clone(),
        }
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Could not parse '{filename}': {reason}")]
    DocumentParse { filename: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding provider '{provider}' failed: {cause}")]
    EmbeddingProvider { provider: String, cause: String },

    #[error("Provider '{provider}' failed: {cause}")]
    Provider { provider: String, cause: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn document_parse(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentParse {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    pub fn embedding(provider: impl Into<String>, cause: impl ToString) -> Self {
        Self::EmbeddingProvider {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }

    pub fn provider(provider: impl Into<String>, cause: impl ToString) -> Self {
        Self::Provider {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }

    /// Stable, machine-readable kind for rendering by a front end.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::DocumentParse { .. } => "document_parse",
            AppError::Configuration(_) => "configuration",
            AppError::EmbeddingProvider { .. } => "embedding_provider",
            AppError::Provider { .. } => "provider",
            AppError::Validation(_) => "validation",
            AppError::Io(_) => "io",
            AppError::Internal(_) => "internal",
        }
    }

    /// Component the error originated from.
    pub fn component(&self) -> &'static str {
        match self {
            AppError::DocumentParse { .. } => "loader",
            AppError::Configuration(_) => "configuration",
            AppError::EmbeddingProvider { .. } => "indexer",
            AppError::Provider { .. } => "llm",
            AppError::Validation(_) => "orchestrator",
            AppError::Io(_) => "storage",
            AppError::Internal(_) => "core",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
