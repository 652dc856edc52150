//! Menu knowledge base: a fixed list of menu records embedded once and searched by
//! semantic similarity.
//!
//! ```text
//! [MenuRecord] --embed once--> VectorIndex
//! query --embed--> VectorIndex::search(k) --> closest MenuRecords
//! ```
//!
//! The knowledge base is immutable after [`KnowledgeBase::build`] and is shared behind
//! an `Arc` by every tool call; no locking is involved.

pub mod embeddings;
pub mod index;

pub use embeddings::{EmbeddingProvider, OpenAiCompatibleEmbeddings, DEFAULT_EMBEDDING_MODEL};
pub use index::{cosine_similarity, IndexConfig, InMemoryIndex, SearchHit, VectorIndex};

use crate::llm::traits::LlmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The menu the shop ships with, in retrieval tie-break order
pub const DEFAULT_MENU: &[&str] = &["Big Mac: $5", "Whopper: $6", "Fries: $2"];

/// Errors from embedding providers and vector indexes
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Provider(#[from] LlmError),

    #[error("Invalid embedding response: {message}")]
    InvalidResponse { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One menu entry, stored as the literal text `"<name>: $<price>"`
///
/// No structured price is kept; [`name`](Self::name) and [`price_text`](Self::price_text)
/// only split the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MenuRecord(String);

impl MenuRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text before the first `:`, or the whole record when there is none
    pub fn name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(name, _)| name).trim()
    }

    /// Text after the first `:`, e.g. `"$5"`
    pub fn price_text(&self) -> Option<&str> {
        self.0
            .split_once(':')
            .map(|(_, price)| price.trim())
            .filter(|price| !price.is_empty())
    }
}

impl fmt::Display for MenuRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MenuRecord {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// The default three-item menu
pub fn default_menu() -> Vec<MenuRecord> {
    DEFAULT_MENU.iter().map(|text| MenuRecord::from(*text)).collect()
}

/// Immutable, embedded menu
#[derive(Debug)]
pub struct KnowledgeBase {
    records: Vec<MenuRecord>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Box<dyn VectorIndex>,
}

impl KnowledgeBase {
    /// Embed every record once into an [`InMemoryIndex`]
    pub async fn build(
        records: Vec<MenuRecord>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &IndexConfig,
    ) -> Result<Self, EmbeddingError> {
        Self::build_with_index(records, embedder, Box::new(InMemoryIndex::with_config(config)))
            .await
    }

    /// Embed every record once into the given index
    pub async fn build_with_index(
        records: Vec<MenuRecord>,
        embedder: Arc<dyn EmbeddingProvider>,
        mut index: Box<dyn VectorIndex>,
    ) -> Result<Self, EmbeddingError> {
        if !records.is_empty() {
            let texts: Vec<String> = records.iter().map(|r| r.as_str().to_string()).collect();
            let embeddings = embedder.embed(&texts).await?;
            if embeddings.len() != records.len() {
                return Err(EmbeddingError::InvalidResponse {
                    message: format!(
                        "expected {} embeddings, got {}",
                        records.len(),
                        embeddings.len()
                    ),
                });
            }
            for (id, embedding) in embeddings.into_iter().enumerate() {
                index.insert(id, embedding)?;
            }
        }

        tracing::info!(
            "Knowledge base built with {} records using {}",
            records.len(),
            embedder.model()
        );
        Ok(Self {
            records,
            embedder,
            index,
        })
    }

    /// The `k` records closest to `query`, best first
    ///
    /// An empty knowledge base (or `k == 0`) answers without calling the embedder.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<MenuRecord>, EmbeddingError> {
        if self.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                message: "no embedding returned for query".to_string(),
            })?;

        let hits = self.index.search(&query_embedding, k)?;
        tracing::debug!(
            "Retrieved {} records for '{}': {:?}",
            hits.len(),
            query,
            hits.iter().map(|h| (h.id, h.score)).collect::<Vec<_>>()
        );

        Ok(hits
            .into_iter()
            .filter_map(|hit| self.records.get(hit.id).cloned())
            .collect())
    }

    pub fn records(&self) -> &[MenuRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
