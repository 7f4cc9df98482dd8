//! Mock reranker implementation for testing and model-less deployments.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::search::traits::{ModelError, Reranker};

/// Mock reranker with three behaviours: a configured score sequence, a
/// crude lexical-overlap heuristic, or systematic failure.
#[derive(Clone)]
pub struct MockReranker {
    scores: Option<Arc<Vec<f32>>>,
    call_count: Arc<AtomicUsize>,
    fail_with: Option<ModelError>,
}

impl MockReranker {
    /// Score passage `i` with `scores[i]`, repeating the last value when
    /// there are more passages than configured scores.
    pub fn returning(scores: Vec<f32>) -> Self {
        Self {
            scores: Some(Arc::new(scores)),
            call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
        }
    }

    /// Fail every call with the given error.
    pub fn failing(error: ModelError) -> Self {
        Self {
            scores: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: Some(error),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockReranker {
    fn default() -> Self {
        Self {
            scores: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            fail_with: None,
        }
    }
}

/// Fraction of query words found in the passage, as a stand-in score.
fn lexical_overlap(query: &str, passage: &str) -> f32 {
    let passage = passage.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let hits = words
        .iter()
        .filter(|w| passage.contains(&w.to_lowercase()))
        .count();
    hits as f32 / words.len() as f32
}

#[async_trait]
impl Reranker for MockReranker {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, ModelError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.call_count.fetch_add(1, Ordering::SeqCst);

        match &self.scores {
            Some(scores) => Ok((0..passages.len())
                .map(|i| {
                    scores
                        .get(i)
                        .or(scores.last())
                        .copied()
                        .unwrap_or_default()
                })
                .collect()),
            None => Ok(passages
                .iter()
                .map(|p| lexical_overlap(query, p))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returning_scores_in_order() {
        let reranker = MockReranker::returning(vec![0.9, 0.5]);
        let scores = reranker.score("q", &["a", "b", "c"]).await.unwrap();
        assert_eq!(scores, vec![0.9, 0.5, 0.5]);
        assert_eq!(reranker.call_count(), 1);
    }

    #[tokio::test]
    async fn default_uses_lexical_overlap() {
        let reranker = MockReranker::default();
        let scores = reranker
            .score("risque climatique", &["le risque climatique augmente", "sans rapport"])
            .await
            .unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn failing_mock_fails() {
        let reranker = MockReranker::failing(ModelError::Inference("boom".into()));
        assert!(reranker.score("q", &["a"]).await.is_err());
    }
}
