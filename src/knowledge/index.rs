//! Nearest-neighbour index over record embeddings.

use super::EmbeddingError;

/// One scored match returned by a [`VectorIndex`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Position of the record in insertion order
    pub id: usize,
    pub score: f32,
}

/// Top-k similarity search over stored embeddings
///
/// Implementations must return hits best-first and keep insertion order between equal
/// scores.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    fn insert(&mut self, id: usize, embedding: Vec<f32>) -> Result<(), EmbeddingError>;

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, EmbeddingError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index settings
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndexConfig {
    /// Hits scoring below this cosine similarity are dropped
    #[serde(default)]
    pub min_score: Option<f32>,
}

/// Brute-force cosine similarity index held in memory
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: Vec<(usize, Vec<f32>)>,
    dimensions: Option<usize>,
    min_score: Option<f32>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &IndexConfig) -> Self {
        Self {
            min_score: config.min_score,
            ..Self::default()
        }
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn check_dimensions(&self, actual: usize) -> Result<(), EmbeddingError> {
        match self.dimensions {
            Some(expected) if expected != actual => {
                Err(EmbeddingError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }
}

impl VectorIndex for InMemoryIndex {
    fn insert(&mut self, id: usize, embedding: Vec<f32>) -> Result<(), EmbeddingError> {
        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse {
                message: format!("empty embedding for record {}", id),
            });
        }
        self.check_dimensions(embedding.len())?;
        self.dimensions = Some(embedding.len());
        self.entries.push((id, embedding));
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, EmbeddingError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimensions(query.len())?;

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|(id, embedding)| SearchHit {
                id: *id,
                score: cosine_similarity(query, embedding),
            })
            .filter(|hit| self.min_score.map_or(true, |min| hit.score >= min))
            .collect();

        // stable sort keeps insertion order between equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a.iter().zip(b.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, norm_a, norm_b), (&x, &y)| {
            let x = f64::from(x);
            let y = f64::from(y);
            (dot + x * y, norm_a + x * x, norm_b + y * y)
        },
    );

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(vectors: &[[f32; 3]], config: IndexConfig) -> InMemoryIndex {
        let mut index = InMemoryIndex::with_config(&config);
        for (id, v) in vectors.iter().enumerate() {
            index.insert(id, v.to_vec()).unwrap();
        }
        index
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_best_first() {
        let index = index_with(
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.7, 0.7, 0.0]],
            IndexConfig::default(),
        );
        let hits = index.search(&[0.0, 1.0, 0.0], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);

        let hits = index.search(&[0.0, 1.0, 0.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = index_with(
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            IndexConfig::default(),
        );
        // zero query scores every record 0.0
        let hits = index.search(&[0.0, 0.0, 0.0], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_min_score_drops_weak_hits() {
        let index = index_with(
            &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            IndexConfig {
                min_score: Some(0.5),
            },
        );
        let hits = index.search(&[1.0, 0.1, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 0);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let index = InMemoryIndex::new();
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 3).unwrap().is_empty());

        let index = index_with(&[[1.0, 0.0, 0.0]], IndexConfig::default());
        assert!(index.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = InMemoryIndex::new();
        index.insert(0, vec![1.0, 0.0]).unwrap();
        assert_eq!(index.dimensions(), Some(2));

        let err = index.insert(1, vec![1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(index.search(&[1.0], 1).is_err());
        assert!(index.insert(2, Vec::new()).is_err());
    }
}
