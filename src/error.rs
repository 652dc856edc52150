//! Error handling for the menu agent
//!
//! Every layer has its own error enum (`LlmError`, `EmbeddingError`, `ToolError`,
//! `ConfigError`); they all convert into [`MenuAgentError`], which is what the public
//! [`Agent`](crate::agent::Agent) API returns.
//!
//! Two outcomes are deliberately *not* errors: a lookup with no matching menu item
//! (answered in-band with a sentinel string) and a conversation with no usable reply
//! turn (answered with the raw conversation rendering).

use thiserror::Error;

use crate::config::ConfigError;
use crate::knowledge::EmbeddingError;
use crate::llm::traits::LlmError;

/// Main error type for the menu agent
#[derive(Error, Debug, Clone)]
pub enum MenuAgentError {
    /// Input validation errors (user-provided data is invalid)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors (missing credentials, bad config files)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Completion provider failures
    #[error("Model error: {message}")]
    ModelError { message: String },

    /// Tool execution errors
    #[error("Tool error: {message}")]
    ToolError { message: String },

    /// Embedding or vector index failures
    #[error("Embedding error: {message}")]
    EmbeddingError { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl MenuAgentError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn model_error(message: impl Into<String>) -> Self {
        Self::ModelError {
            message: message.into(),
        }
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        Self::ToolError {
            message: message.into(),
        }
    }

    pub fn embedding_error(message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            message: message.into(),
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Configuration problems are fatal and must be fixed by the operator
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, MenuAgentError::ConfigurationError { .. })
    }

    /// Check if the failure came from talking to a remote service
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            MenuAgentError::ModelError { .. }
                | MenuAgentError::EmbeddingError { .. }
                | MenuAgentError::NetworkError { .. }
        )
    }
}

impl From<serde_json::Error> for MenuAgentError {
    fn from(error: serde_json::Error) -> Self {
        MenuAgentError::serialization_error(format!("JSON serialization failed: {}", error))
    }
}

impl From<crate::tools::ToolError> for MenuAgentError {
    fn from(error: crate::tools::ToolError) -> Self {
        use crate::tools::ToolError;

        match error {
            ToolError::InvalidParameters { message } => MenuAgentError::invalid_input(format!(
                "Tool parameter validation failed: {}",
                message
            )),
            ToolError::ToolNotFound { name } => {
                MenuAgentError::tool_error(format!("Tool '{}' not found", name))
            }
            ToolError::DuplicateTool { name } => {
                MenuAgentError::configuration_error(format!("Duplicate tool name: '{}'", name))
            }
            ToolError::ExecutionFailed { message } => {
                MenuAgentError::tool_error(format!("Tool execution failed: {}", message))
            }
            ToolError::KnowledgeUnavailable { message } => MenuAgentError::embedding_error(message),
        }
    }
}

impl From<LlmError> for MenuAgentError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::AuthenticationError { .. } | LlmError::ConfigurationError { .. } => {
                MenuAgentError::configuration_error(error.to_string())
            }
            LlmError::NetworkError { .. } => MenuAgentError::network_error(error.to_string()),
            LlmError::SerializationError { .. } => {
                MenuAgentError::serialization_error(error.to_string())
            }
            _ => MenuAgentError::model_error(error.to_string()),
        }
    }
}

impl From<EmbeddingError> for MenuAgentError {
    fn from(error: EmbeddingError) -> Self {
        MenuAgentError::embedding_error(error.to_string())
    }
}

impl From<ConfigError> for MenuAgentError {
    fn from(error: ConfigError) -> Self {
        MenuAgentError::configuration_error(error.to_string())
    }
}
