//! Trait definitions for the search domain.
//!
//! These traits decouple the engine from the inference backends and the
//! database, so the pipeline can be tested with mocks.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{CandidateRow, HierarchicalContext, SearchRecord, SearchRequest};

/// Failure of an inference backend. Non-retriable from the caller's side.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Error type for search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("embedding generation failed: {0}")]
    Embedding(#[source] ModelError),

    #[error("reranking failed: {0}")]
    Reranking(#[source] ModelError),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for SearchError {
    fn from(e: sqlx::Error) -> Self {
        SearchError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Maps a batch of texts to fixed-dimension dense vectors.
///
/// Implementations hold a single loaded model shared across callers; calls
/// may run concurrently. Inputs longer than the model context are
/// right-truncated (the head is kept).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate the embedding of a single text.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ModelError>;

    /// Generate embeddings for multiple texts.
    ///
    /// The default implementation embeds sequentially; implementations
    /// should override it with a real batch call.
    async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> std::result::Result<Vec<Vec<f32>>, ModelError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Embedding dimensions produced by this model.
    fn dimensions(&self) -> usize;
}

/// Scores (query, passage) pairs with a cross-encoder.
///
/// Scores are unbounded raw model outputs; higher means more relevant.
/// Normalization is the search layer's business.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(
        &self,
        query: &str,
        passages: &[&str],
    ) -> std::result::Result<Vec<f32>, ModelError>;
}

/// Persistence operations needed by the search pipeline.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Fetch the expanded candidate pool ordered by vector distance, with
    /// the request's metadata filters applied.
    async fn fetch_candidates(
        &self,
        request: &SearchRequest,
        embedding: &[f32],
        expanded_limit: i64,
    ) -> Result<Vec<CandidateRow>>;

    /// Walk the parent pointers of a chunk, up to three ancestors.
    async fn fetch_parent_chain(&self, chunk_id: i64) -> Result<HierarchicalContext>;

    /// Best-effort audit insert; implementations swallow storage errors.
    async fn log_search(&self, record: &SearchRecord) -> Result<()>;
}

#[async_trait]
impl<T> Embedder for Arc<T>
where
    T: Embedder + ?Sized,
{
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ModelError> {
        (**self).embed(text).await
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> std::result::Result<Vec<Vec<f32>>, ModelError> {
        (**self).embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

#[async_trait]
impl<T> Reranker for Arc<T>
where
    T: Reranker + ?Sized,
{
    async fn score(
        &self,
        query: &str,
        passages: &[&str],
    ) -> std::result::Result<Vec<f32>, ModelError> {
        (**self).score(query, passages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the traits stay object-safe.
    fn _assert_embedder_object_safe(_: &dyn Embedder) {}
    fn _assert_reranker_object_safe(_: &dyn Reranker) {}
    fn _assert_store_object_safe(_: &dyn SearchStore) {}

    #[test]
    fn model_errors_format() {
        let e = ModelError::Unavailable("weights missing".into());
        assert_eq!(e.to_string(), "model unavailable: weights missing");
    }
}
