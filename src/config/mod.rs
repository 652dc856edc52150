//! Configuration management
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults;
//! 2. an optional TOML file (`--config`, `MENU_AGENT_CONFIG`, or `menu-agent.toml` in the
//!    working directory);
//! 3. environment variables, after `.env` in the working directory has been loaded.
//!
//! The only required setting is `GEMINI_API_KEY`; [`AppConfig::validate`] rejects its
//! absence before anything talks to a provider.

use crate::knowledge::{default_menu, IndexConfig, MenuRecord, DEFAULT_EMBEDDING_MODEL};
use crate::llm::providers::{RetryConfig, GEMINI_OPENAI_BASE_URL};
use crate::llm::traits::ChatConfig;
use crate::telemetry::{LoggingConfig, ObservabilityConfig};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

/// Chat model used when none is configured
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "menu-agent.toml";

/// Environment variable holding the provider key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} not found in environment variables. Please set it in your .env file.")]
    MissingCredential { name: String },
    #[error("Invalid value {value:?} for {name}")]
    EnvVarParse { name: String, value: String },
    #[error("File parsing error: {0}")]
    FileParse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Completion provider settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider key; normally supplied through `GEMINI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Retries of a failed HTTP request after the first attempt; 0 disables retries
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: GEMINI_OPENAI_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: None,
            max_retries: RetryConfig::provider_default().max_attempts,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ProviderConfig {
    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            temperature: Some(self.temperature),
            max_tokens: self.max_tokens,
            ..ChatConfig::new(&self.chat_model)
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        if self.max_retries == 0 {
            return RetryConfig::disabled();
        }
        RetryConfig {
            max_attempts: self.max_retries,
            ..RetryConfig::provider_default()
        }
    }
}

/// Embedding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Defaults to the provider base URL
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: None,
        }
    }
}

/// Knowledge base settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Menu records in retrieval tie-break order
    pub records: Vec<MenuRecord>,
    /// Records returned per lookup
    pub top_k: usize,
    /// Drop hits scoring below this cosine similarity
    pub min_score: Option<f32>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            records: default_menu(),
            top_k: crate::tools::DEFAULT_TOP_K,
            min_score: None,
        }
    }
}

impl KnowledgeConfig {
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            min_score: self.min_score,
        }
    }
}

/// Agent loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_cycles: u32,
    /// Replaces the built-in burger shop instructions
    pub system_prompt: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_cycles: crate::agent::DEFAULT_MAX_CYCLES,
            system_prompt: None,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub embedding: EmbeddingConfig,
    pub knowledge: KnowledgeConfig,
    pub agent: AgentSettings,
    pub observability: ObservabilityConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load `.env`, the config file and environment overrides, then validate
    ///
    /// Without an explicit `path`, `MENU_AGENT_CONFIG` is consulted, then
    /// `menu-agent.toml` in the working directory; a missing default file is fine.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load_unchecked(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load) but without validation, for commands that never
    /// reach a provider
    pub fn load_unchecked(path: Option<&Path>) -> Result<Self, ConfigError> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("MENU_AGENT_CONFIG").ok().map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        config.apply_env()?;
        config.logging.apply_env();
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::FileParse(format!("{}: {}", path.display(), e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_VAR) {
            self.provider.api_key = Some(key);
        }
        if let Some(base_url) = lookup("MENU_AGENT_BASE_URL") {
            self.provider.base_url = base_url;
        }
        if let Some(model) = lookup("MENU_AGENT_CHAT_MODEL") {
            self.provider.chat_model = model;
        }
        if let Some(model) = lookup("MENU_AGENT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(top_k) = lookup("MENU_AGENT_TOP_K") {
            self.knowledge.top_k = parse_var("MENU_AGENT_TOP_K", top_k)?;
        }
        if let Some(max_cycles) = lookup("MENU_AGENT_MAX_CYCLES") {
            self.agent.max_cycles = parse_var("MENU_AGENT_MAX_CYCLES", max_cycles)?;
        }

        if let Some(public_key) = lookup("LANGFUSE_PUBLIC_KEY") {
            self.observability.public_key = Some(public_key);
        }
        if let Some(secret_key) = lookup("LANGFUSE_SECRET_KEY") {
            self.observability.secret_key = Some(secret_key);
        }
        if let Some(host) = lookup("LANGFUSE_HOST") {
            self.observability.host = host;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_key()?;

        if self.provider.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "Provider base URL cannot be empty".to_string(),
            ));
        }
        if self.provider.chat_model.is_empty() {
            return Err(ConfigError::Validation(
                "Chat model cannot be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::Validation(
                "Temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.knowledge.top_k == 0 {
            return Err(ConfigError::Validation(
                "Top-k must be greater than 0".to_string(),
            ));
        }
        if self.agent.max_cycles == 0 {
            return Err(ConfigError::Validation(
                "Max cycles must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The provider key, or the missing-credential error
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.provider
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                name: API_KEY_VAR.to_string(),
            })
    }

    /// Base URL for embeddings, falling back to the provider's
    pub fn embedding_base_url(&self) -> &str {
        self.embedding
            .base_url
            .as_deref()
            .unwrap_or(&self.provider.base_url)
    }
}

fn parse_var<T: FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::EnvVarParse {
        name: name.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider.chat_model, "gemini-2.0-flash");
        assert_eq!(config.provider.base_url, GEMINI_OPENAI_BASE_URL);
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.knowledge.records, default_menu());
        assert_eq!(config.knowledge.top_k, 3);
        assert_eq!(config.agent.max_cycles, 10);
        assert!(config.observability.enabled);
        assert_eq!(config.observability.host, "http://localhost:3000");
    }

    #[test]
    fn test_missing_api_key_is_descriptive() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
        assert_eq!(
            err.to_string(),
            "GEMINI_API_KEY not found in environment variables. Please set it in your .env file."
        );

        let mut config = AppConfig::default();
        config.apply_overrides(vars(&[("GEMINI_API_KEY", "   ")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(vars(&[
                ("GEMINI_API_KEY", "key-123"),
                ("MENU_AGENT_CHAT_MODEL", "gemini-1.5-pro"),
                ("MENU_AGENT_TOP_K", "1"),
                ("LANGFUSE_PUBLIC_KEY", "pk"),
                ("LANGFUSE_SECRET_KEY", "sk"),
                ("LANGFUSE_HOST", "https://cloud.langfuse.com"),
            ]))
            .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.api_key().unwrap(), "key-123");
        assert_eq!(config.provider.chat_config().model_id, "gemini-1.5-pro");
        assert_eq!(config.knowledge.top_k, 1);
        assert!(config.observability.has_credentials());
        assert_eq!(config.observability.host, "https://cloud.langfuse.com");
    }

    #[test]
    fn test_unparseable_env_value() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(vars(&[("MENU_AGENT_MAX_CYCLES", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParse { .. }));
    }

    #[test]
    fn test_toml_config_loading() {
        let toml_content = r#"
[provider]
chat_model = "gemini-1.5-flash"
temperature = 0.2

[knowledge]
records = ["Big Mac: $5", "McFlurry: $3"]
top_k = 2
min_score = 0.5

[agent]
max_cycles = 4

[observability]
enabled = false
"#;

        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        std::fs::write(temp_file.path(), toml_content).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.provider.chat_model, "gemini-1.5-flash");
        assert_eq!(config.provider.base_url, GEMINI_OPENAI_BASE_URL);
        assert_eq!(config.knowledge.records.len(), 2);
        assert_eq!(config.knowledge.records[1].as_str(), "McFlurry: $3");
        assert_eq!(config.knowledge.index_config().min_score, Some(0.5));
        assert_eq!(config.agent.max_cycles, 4);
        assert!(!config.observability.enabled);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_bad_toml_is_file_parse_error() {
        let temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        std::fs::write(temp_file.path(), "[provider\n").unwrap();
        assert!(matches!(
            AppConfig::from_file(temp_file.path()),
            Err(ConfigError::FileParse(_))
        ));
    }

    #[test]
    fn test_retry_config_follows_attempts() {
        let mut provider = ProviderConfig::default();
        assert_eq!(provider.retry_config().max_attempts, 3);
        provider.max_retries = 0;
        assert_eq!(provider.retry_config().max_attempts, 0);
    }
}
