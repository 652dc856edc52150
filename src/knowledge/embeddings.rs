//! Text embedding providers.

use super::EmbeddingError;
use crate::llm::providers::openai_compat::{post_json_with_retry, GEMINI_OPENAI_BASE_URL};
use crate::llm::providers::retry::RetryConfig;
use crate::llm::traits::ProviderType;
use async_trait::async_trait;
use serde_json::json;

/// Default embedding model served by Gemini's OpenAI-compatible endpoint
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Turns texts into fixed-length vectors
///
/// The returned vectors are in input order, one per text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Model name, used in logs
    fn model(&self) -> &str;
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleEmbeddings {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl OpenAiCompatibleEmbeddings {
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(GEMINI_OPENAI_BASE_URL, api_key, DEFAULT_EMBEDDING_MODEL)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            retry_config: RetryConfig::provider_default(),
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    fn provider_type(&self) -> ProviderType {
        if self.base_url.contains("generativelanguage.googleapis.com") {
            ProviderType::Gemini
        } else {
            ProviderType::OpenAiCompatible
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Embedding {} texts with {}", texts.len(), self.model);
        let response = post_json_with_retry(
            &self.client,
            format!("{}/embeddings", self.base_url),
            &self.api_key,
            json!({
                "model": self.model,
                "input": texts,
            }),
            self.provider_type(),
            &self.retry_config,
        )
        .await?;

        parse_embeddings_response(&response, texts.len())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Parse `{"data": [{"index": i, "embedding": [...]}, ...]}` into input order
fn parse_embeddings_response(
    response: &serde_json::Value,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let data = response
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbeddingError::InvalidResponse {
            message: "missing data array".to_string(),
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                message: format!("item {} has no embedding", position),
            })?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                message: format!("item {} has non-numeric values", position),
            })?;
        indexed.push((index, embedding));
    }

    if indexed.len() != expected {
        return Err(EmbeddingError::InvalidResponse {
            message: format!("expected {} embeddings, got {}", expected, indexed.len()),
        });
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, embedding)| embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_restores_input_order() {
        let response = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let parsed = parse_embeddings_response(&response, 2).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let response = json!({"data": [{"index": 0, "embedding": [1.0]}]});
        let err = parse_embeddings_response(&response, 3).unwrap_err();
        assert!(err.to_string().contains("expected 3 embeddings, got 1"));
    }

    #[test]
    fn test_parse_rejects_malformed_items() {
        assert!(parse_embeddings_response(&json!({}), 1).is_err());
        assert!(parse_embeddings_response(&json!({"data": [{"index": 0}]}), 1).is_err());
        assert!(
            parse_embeddings_response(&json!({"data": [{"embedding": ["x"]}]}), 1).is_err()
        );
    }

    #[test]
    fn test_gemini_defaults() {
        let embeddings = OpenAiCompatibleEmbeddings::gemini("key");
        assert_eq!(embeddings.model(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(embeddings.provider_type(), ProviderType::Gemini);
    }

    #[tokio::test]
    async fn test_empty_input_skips_request() {
        let embeddings = OpenAiCompatibleEmbeddings::new("http://127.0.0.1:9", "key", "m");
        assert!(embeddings.embed(&[]).await.unwrap().is_empty());
    }
}
