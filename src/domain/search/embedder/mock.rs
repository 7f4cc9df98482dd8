//! Mock embedder implementation for testing and model-less deployments.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::EMBEDDING_DIMENSIONS;
use crate::domain::search::traits::{Embedder, ModelError};

/// Mock embedder returning configurable vectors.
///
/// # Examples
///
/// ```
/// use clea_api::domain::search::embedder::MockEmbedder;
///
/// // Always the same vector:
/// let embedder = MockEmbedder::returning(vec![0.1; 768]);
///
/// // A different vector per call, wrapping around:
/// let embedder = MockEmbedder::with_sequence(vec![vec![0.1; 768], vec![0.2; 768]]);
/// ```
#[derive(Clone)]
pub struct MockEmbedder {
    responses: Arc<Vec<Vec<f32>>>,
    call_count: Arc<AtomicUsize>,
    fail_with: Option<ModelError>,
    dimensions: usize,
}

impl MockEmbedder {
    /// Always return the same vector.
    pub fn returning(vector: Vec<f32>) -> Self {
        let dims = vector.len();
        Self {
            responses: Arc::new(vec![vector]),
            call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
            dimensions: dims,
        }
    }

    /// Return vectors in sequence, wrapping around when exhausted.
    pub fn with_sequence(vectors: Vec<Vec<f32>>) -> Self {
        let dims = vectors
            .first()
            .map(|v| v.len())
            .unwrap_or(EMBEDDING_DIMENSIONS);
        Self {
            responses: Arc::new(vectors),
            call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
            dimensions: dims,
        }
    }

    /// Fail every call with the given error.
    pub fn failing(error: ModelError) -> Self {
        Self {
            responses: Arc::new(vec![vec![0.0; EMBEDDING_DIMENSIONS]]),
            call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: Some(error),
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }

    /// Number of texts embedded so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::returning(vec![0.0; EMBEDDING_DIMENSIONS])
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ModelError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses[idx % self.responses.len()].clone())
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        let mut results = Vec::with_capacity(texts.len());
        for _ in texts {
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            results.push(self.responses[idx % self.responses.len()].clone());
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_fixed_vector() {
        let embedder = MockEmbedder::returning(vec![1.0, 2.0, 3.0]);
        assert_eq!(embedder.embed("a").await.unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(embedder.embed("b").await.unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn mock_returns_sequence_and_wraps() {
        let embedder = MockEmbedder::with_sequence(vec![vec![1.0], vec![2.0]]);
        assert_eq!(embedder.embed("a").await.unwrap(), vec![1.0]);
        assert_eq!(embedder.embed("b").await.unwrap(), vec![2.0]);
        assert_eq!(embedder.embed("c").await.unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn mock_counts_batch_items() {
        let embedder = MockEmbedder::default();
        embedder.embed_batch(&["a", "b", "c"]).await.unwrap();
        assert_eq!(embedder.call_count(), 3);
        embedder.reset();
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn failing_mock_fails() {
        let embedder = MockEmbedder::failing(ModelError::Unavailable("down".into()));
        assert!(embedder.embed("a").await.is_err());
    }
}
