//! Core traits for the LLM abstraction layer.

use crate::types::Messages;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chat completion provider
///
/// Providers own request formatting, response parsing, authentication and retries.
/// Models are passed as plain model id strings.
#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// Basic chat without tools
    async fn chat(
        &self,
        model_id: &str,
        messages: &Messages,
        config: &ChatConfig,
    ) -> Result<ChatResponse, LlmError>;

    /// Chat with tools the model may decide to call
    async fn chat_with_tools(
        &self,
        model_id: &str,
        messages: &Messages,
        tools: &[Tool],
        config: &ChatConfig,
    ) -> Result<ChatResponse, LlmError>;

    fn provider_type(&self) -> ProviderType;
}

/// LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Gemini through its OpenAI-compatible endpoint
    Gemini,
    /// Any other OpenAI-compatible chat completion server
    OpenAiCompatible,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Gemini => "gemini",
            ProviderType::OpenAiCompatible => "openai_compatible",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-request chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Provider-specific model id
    pub model_id: String,
    /// Sampling temperature; the menu assistant runs deterministic at 0.0
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Extra request body fields passed through verbatim
    #[serde(default)]
    pub additional_params: HashMap<String, serde_json::Value>,
}

impl ChatConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model_id: crate::config::DEFAULT_CHAT_MODEL.to_string(),
            temperature: Some(0.0),
            max_tokens: None,
            additional_params: HashMap::new(),
        }
    }
}

/// Response from one chat completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text content, empty when the model only requested tools
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    /// Provider-specific metadata such as `finish_reason`
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool call request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Tool definition handed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the input object
    pub input_schema: serde_json::Value,
}

/// Token usage for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// LLM-specific error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider error: {message}")]
    ProviderError {
        provider: ProviderType,
        message: String,
        /// HTTP status when the failure came from a non-success response
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthenticationError { provider: ProviderType },

    #[error("Rate limit exceeded for provider {provider}")]
    RateLimitError {
        provider: ProviderType,
        retry_after: Option<u64>,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl LlmError {
    /// Build a provider error for a malformed response body
    pub fn invalid_response(provider: ProviderType, message: impl Into<String>) -> Self {
        LlmError::ProviderError {
            provider,
            message: format!("Invalid response format: {}", message.into()),
            status: None,
            source: None,
        }
    }
}
