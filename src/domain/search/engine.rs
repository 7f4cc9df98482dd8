//! Hybrid search engine: query embedding, SQL candidate selection,
//! cross-encoder reranking, score normalization, confidence and
//! hierarchical enrichment.

use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use super::confidence::{self, MSG_OFF_DOMAIN};
use super::traits::{Embedder, Reranker, Result, SearchStore};
use super::types::{
    CandidateRow, ChunkResult, ConfidenceMetrics, ScoreStats, SearchRecord, SearchRequest,
    SearchResponse,
};

/// Message attached when the query could not be embedded in time.
pub const MSG_EMBEDDER_UNAVAILABLE: &str =
    "Service d'embedding indisponible, résultats non disponibles";
/// Message attached when reranking failed and vector distance ordering was
/// kept.
pub const MSG_RERANKER_DEGRADED: &str =
    "Reranker indisponible: résultats ordonnés par distance vectorielle";

/// Configuration of the search pipeline.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Upper bound applied to the requested `top_k`.
    pub max_top_k: i64,
    /// The candidate pool handed to the reranker is `top_k ×` this.
    pub rerank_multiplier: i64,
    /// Deadline for each embed/rerank call.
    pub model_timeout: Duration,
    /// Disables the audit insert when false.
    pub log_search_queries: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_top_k: 100,
            rerank_multiplier: 3,
            model_timeout: Duration::from_secs(30),
            log_search_queries: true,
        }
    }
}

/// Hybrid search engine over an embedder, a reranker and a store.
///
/// # Type Parameters
///
/// * `E` - embedder generating the query vector
/// * `K` - cross-encoder scoring (query, passage) pairs
/// * `S` - persistence backend for candidates, parents and the audit log
pub struct SearchEngine<E, K, S>
where
    E: Embedder,
    K: Reranker,
    S: SearchStore,
{
    embedder: E,
    reranker: K,
    store: S,
    config: SearchConfig,
}

impl<E, K, S> SearchEngine<E, K, S>
where
    E: Embedder,
    K: Reranker,
    S: SearchStore,
{
    pub fn new(embedder: E, reranker: K, store: S, config: SearchConfig) -> Self {
        Self {
            embedder,
            reranker,
            store,
            config,
        }
    }

    pub fn with_defaults(embedder: E, reranker: K, store: S) -> Self {
        Self::new(embedder, reranker, store, SearchConfig::default())
    }

    /// Executes a hybrid search.
    ///
    /// The pipeline never fails on the degraded path: an unavailable
    /// embedder yields an empty low-confidence response, an unavailable
    /// reranker keeps the vector-distance ordering and flags the response
    /// `message`. Only storage faults surface as errors.
    pub async fn hybrid_search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let top_k = request.top_k.clamp(1, self.config.max_top_k);
        let query = request.query.trim();
        if query.is_empty() {
            return Ok(empty_response(request, top_k, None));
        }

        // 1. Embed the query once, deadline-bounded.
        let embedding = match timeout(self.config.model_timeout, self.embedder.embed(query)).await
        {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => {
                warn!(error = %e, "query embedding failed");
                return Ok(empty_response(
                    request,
                    top_k,
                    Some(MSG_EMBEDDER_UNAVAILABLE.to_string()),
                ));
            }
            Err(_) => {
                warn!("query embedding timed out");
                return Ok(empty_response(
                    request,
                    top_k,
                    Some(MSG_EMBEDDER_UNAVAILABLE.to_string()),
                ));
            }
        };

        // 2. Candidate selection: metadata filters + vector distance.
        let expanded = top_k * self.config.rerank_multiplier;
        let candidates = self
            .store
            .fetch_candidates(request, &embedding, expanded)
            .await?;
        if candidates.is_empty() {
            let response = empty_response(request, top_k, Some(MSG_OFF_DOMAIN.to_string()));
            self.audit(request, 0, response.confidence.level).await;
            return Ok(response);
        }
        let total_results = candidates.len();

        // 3. Rerank the expanded pool; fall back to distance ordering when
        //    the cross-encoder is down.
        let rerank_outcome = {
            let passages: Vec<&str> = candidates.iter().map(|c| c.content.as_str()).collect();
            timeout(self.config.model_timeout, self.reranker.score(query, &passages)).await
        };
        let (mut scored, message) = match rerank_outcome {
            Ok(Ok(scores)) if scores.len() == candidates.len() => {
                let scored: Vec<(CandidateRow, f32)> =
                    candidates.into_iter().zip(scores).collect();
                (scored, None)
            }
            Ok(Ok(_)) => {
                warn!("reranker returned a mismatched score count");
                (
                    distance_scored(candidates),
                    Some(MSG_RERANKER_DEGRADED.to_string()),
                )
            }
            Ok(Err(e)) => {
                warn!(error = %e, "reranking failed");
                (
                    distance_scored(candidates),
                    Some(MSG_RERANKER_DEGRADED.to_string()),
                )
            }
            Err(_) => {
                warn!("reranking timed out");
                (
                    distance_scored(candidates),
                    Some(MSG_RERANKER_DEGRADED.to_string()),
                )
            }
        };

        // 4. Order by score descending; equal scores break on chunk id.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.chunk_id.cmp(&b.0.chunk_id))
        });

        // 5. Optional min-max normalization.
        let normalized = request.normalize_scores;
        if normalized {
            let raw: Vec<f32> = scored.iter().map(|(_, s)| *s).collect();
            for ((_, score), value) in scored.iter_mut().zip(confidence::normalize_scores(&raw)) {
                *score = value;
            }
        }

        // 6. Confidence from the post-normalization top-k score vector.
        let top_scores: Vec<f32> = scored
            .iter()
            .take(top_k as usize)
            .map(|(_, s)| *s)
            .collect();
        let confidence = confidence::evaluate_confidence(&top_scores);

        // 7. Optional relevance floor.
        if request.filter_by_relevance {
            scored.retain(|(_, score)| *score >= confidence::MIN_RELEVANCE);
        }

        // 8. Truncate to the requested size.
        scored.truncate(top_k as usize);

        // 9. Optional hierarchical enrichment.
        let mut results = Vec::with_capacity(scored.len());
        for (row, score) in scored {
            let context = if request.hierarchical {
                let chain = self.store.fetch_parent_chain(row.chunk_id).await?;
                (!chain.is_empty()).then_some(chain)
            } else {
                None
            };
            results.push(ChunkResult {
                chunk_id: row.chunk_id,
                document_id: row.document_id,
                title: row.title,
                content: row.content,
                theme: row.theme,
                document_type: row.document_type,
                publish_date: row.publish_date,
                score,
                hierarchy_level: row.hierarchy_level,
                context,
            });
        }

        // 10. Best-effort audit.
        self.audit(request, results.len(), confidence.level).await;

        Ok(SearchResponse {
            query: request.query.clone(),
            top_k,
            total_results,
            results,
            confidence,
            normalized,
            message,
        })
    }

    async fn audit(&self, request: &SearchRequest, results_count: usize, confidence_level: f32) {
        if !self.config.log_search_queries {
            return;
        }
        let record = SearchRecord {
            query_text: request.query.clone(),
            theme: request.theme.clone(),
            document_type: request.document_type.clone(),
            corpus_id: request.corpus_id.clone(),
            results_count: results_count as i32,
            confidence_level,
            user_id: None,
        };
        if let Err(e) = self.store.log_search(&record).await {
            warn!(error = %e, "search audit failed");
        }
    }
}

/// Cosine similarity derived from the SQL distance, used when the
/// cross-encoder is unavailable. Rows without an embedding sink to zero.
fn distance_scored(candidates: Vec<CandidateRow>) -> Vec<(CandidateRow, f32)> {
    candidates
        .into_iter()
        .map(|row| {
            let score = 1.0 - row.distance.unwrap_or(1.0) as f32;
            (row, score)
        })
        .collect()
}

fn empty_response(request: &SearchRequest, top_k: i64, message: Option<String>) -> SearchResponse {
    SearchResponse {
        query: request.query.clone(),
        top_k,
        total_results: 0,
        results: vec![],
        confidence: ConfidenceMetrics {
            level: 0.1,
            message: MSG_OFF_DOMAIN.to_string(),
            stats: ScoreStats::default(),
        },
        normalized: false,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::embedder::MockEmbedder;
    use crate::domain::search::reranker::MockReranker;
    use crate::domain::search::store::MockSearchStore;
    use crate::domain::search::traits::ModelError;
    use crate::domain::search::types::{HierarchicalContext, ParentChunk};
    use time::macros::date;

    fn candidate(chunk_id: i64, distance: f64, content: &str) -> CandidateRow {
        CandidateRow {
            chunk_id,
            document_id: 1,
            content: content.to_string(),
            hierarchy_level: 3,
            title: "Rapport RSE".to_string(),
            theme: Some("RSE".to_string()),
            document_type: Some("PDF".to_string()),
            publish_date: Some(date!(2024 - 06 - 01)),
            distance: Some(distance),
        }
    }

    fn engine(
        store: MockSearchStore,
        reranker: MockReranker,
    ) -> SearchEngine<MockEmbedder, MockReranker, MockSearchStore> {
        SearchEngine::with_defaults(MockEmbedder::default(), reranker, store)
    }

    #[tokio::test]
    async fn empty_query_returns_empty_response() {
        let engine = engine(MockSearchStore::new(), MockReranker::default());
        let response = engine
            .hybrid_search(&SearchRequest::new("   "))
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.total_results, 0);
    }

    #[tokio::test]
    async fn zero_candidates_yield_off_domain_response() {
        let store = MockSearchStore::new();
        let engine = engine(store.clone(), MockReranker::default());

        let response = engine
            .hybrid_search(&SearchRequest::new("hors domaine"))
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.confidence.level, 0.1);
        assert_eq!(response.confidence.message, MSG_OFF_DOMAIN);
        assert_eq!(response.message.as_deref(), Some(MSG_OFF_DOMAIN));

        let logged = store.logged();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].results_count, 0);
    }

    #[tokio::test]
    async fn reranker_order_overrides_distance_order() {
        let store = MockSearchStore::new().with_candidates(vec![
            candidate(1, 0.1, "proche par distance"),
            candidate(2, 0.5, "loin par distance"),
        ]);
        // The reranker prefers the second candidate.
        let engine = engine(store, MockReranker::returning(vec![0.2, 0.9]));

        let response = engine
            .hybrid_search(&SearchRequest::new("question"))
            .await
            .unwrap();

        assert_eq!(response.results[0].chunk_id, 2);
        assert_eq!(response.results[1].chunk_id, 1);
        assert!(response.results[0].score > response.results[1].score);
        assert!(response.message.is_none());
    }

    #[tokio::test]
    async fn equal_scores_break_ties_on_chunk_id() {
        let store = MockSearchStore::new().with_candidates(vec![
            candidate(42, 0.3, "a"),
            candidate(7, 0.2, "b"),
            candidate(19, 0.1, "c"),
        ]);
        let engine = engine(store, MockReranker::returning(vec![0.5, 0.5, 0.5]));

        let response = engine
            .hybrid_search(&SearchRequest::new("question"))
            .await
            .unwrap();

        let ids: Vec<i64> = response.results.iter().map(|r| r.chunk_id).collect();
        assert_eq!(ids, vec![7, 19, 42]);
    }

    #[tokio::test]
    async fn top_k_is_clamped_to_valid_range() {
        let store = MockSearchStore::new().with_candidates(
            (1..=5).map(|i| candidate(i, 0.1 * i as f64, "texte")).collect(),
        );

        let mut request = SearchRequest::new("question");
        request.top_k = 0;
        let response = engine(store.clone(), MockReranker::default())
            .hybrid_search(&request)
            .await
            .unwrap();
        assert_eq!(response.top_k, 1);
        assert_eq!(response.results.len(), 1);

        let mut request = SearchRequest::new("question");
        request.top_k = 500;
        let response = engine(store, MockReranker::default())
            .hybrid_search(&request)
            .await
            .unwrap();
        assert_eq!(response.top_k, 100);
    }

    #[tokio::test]
    async fn truncates_to_top_k_and_reports_pool_size() {
        let store = MockSearchStore::new().with_candidates(
            (1..=6).map(|i| candidate(i, 0.1 * i as f64, "texte")).collect(),
        );
        let mut request = SearchRequest::new("question");
        request.top_k = 2;

        let response = engine(store, MockReranker::default())
            .hybrid_search(&request)
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.total_results, 6);
    }

    #[tokio::test]
    async fn normalization_maps_scores_to_unit_interval() {
        let store = MockSearchStore::new().with_candidates(vec![
            candidate(1, 0.1, "a"),
            candidate(2, 0.2, "b"),
            candidate(3, 0.3, "c"),
        ]);
        let engine = engine(store, MockReranker::returning(vec![-4.0, 1.0, 6.0]));

        let mut request = SearchRequest::new("question");
        request.normalize_scores = true;
        let response = engine.hybrid_search(&request).await.unwrap();

        assert!(response.normalized);
        assert_eq!(response.results[0].score, 1.0);
        assert_eq!(response.results[2].score, 0.0);
    }

    #[tokio::test]
    async fn identical_scores_normalize_to_half() {
        let store = MockSearchStore::new()
            .with_candidates(vec![candidate(1, 0.1, "a"), candidate(2, 0.2, "b")]);
        let engine = engine(store, MockReranker::returning(vec![3.5, 3.5]));

        let mut request = SearchRequest::new("question");
        request.normalize_scores = true;
        let response = engine.hybrid_search(&request).await.unwrap();

        assert!(response.results.iter().all(|r| r.score == 0.5));
    }

    #[tokio::test]
    async fn relevance_filter_drops_weak_results() {
        let store = MockSearchStore::new().with_candidates(vec![
            candidate(1, 0.1, "fort"),
            candidate(2, 0.2, "moyen"),
            candidate(3, 0.3, "faible"),
        ]);
        let engine = engine(store, MockReranker::returning(vec![0.9, 0.5, 0.1]));

        let mut request = SearchRequest::new("question");
        request.filter_by_relevance = true;
        let response = engine.hybrid_search(&request).await.unwrap();

        assert_eq!(response.results.len(), 2);
        assert!(response
            .results
            .iter()
            .all(|r| r.score >= confidence::MIN_RELEVANCE));
    }

    #[tokio::test]
    async fn hierarchical_enrichment_attaches_parent_chain() {
        let context = HierarchicalContext {
            level_0: Some(ParentChunk {
                id: 100,
                content: "racine".into(),
                hierarchy_level: 0,
            }),
            level_1: None,
            level_2: Some(ParentChunk {
                id: 101,
                content: "paragraphe".into(),
                hierarchy_level: 2,
            }),
        };
        let store = MockSearchStore::new()
            .with_candidates(vec![candidate(1, 0.1, "a"), candidate(2, 0.2, "b")])
            .with_parent_chain(1, context.clone());
        let engine = engine(store, MockReranker::returning(vec![0.9, 0.8]));

        let mut request = SearchRequest::new("question");
        request.hierarchical = true;
        let response = engine.hybrid_search(&request).await.unwrap();

        assert_eq!(response.results[0].context, Some(context));
        assert_eq!(response.results[1].context, None);
    }

    #[tokio::test]
    async fn embedder_failure_degrades_to_empty_response() {
        let store = MockSearchStore::new().with_candidates(vec![candidate(1, 0.1, "a")]);
        let engine = SearchEngine::with_defaults(
            MockEmbedder::failing(ModelError::Unavailable("down".into())),
            MockReranker::default(),
            store,
        );

        let response = engine
            .hybrid_search(&SearchRequest::new("question"))
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.confidence.level, 0.1);
        assert_eq!(response.message.as_deref(), Some(MSG_EMBEDDER_UNAVAILABLE));
    }

    #[tokio::test]
    async fn reranker_failure_keeps_distance_ordering() {
        let store = MockSearchStore::new().with_candidates(vec![
            candidate(2, 0.4, "plus loin"),
            candidate(1, 0.1, "plus proche"),
        ]);
        let engine = engine(
            store,
            MockReranker::failing(ModelError::Inference("boom".into())),
        );

        let response = engine
            .hybrid_search(&SearchRequest::new("question"))
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].chunk_id, 1);
        assert_eq!(response.message.as_deref(), Some(MSG_RERANKER_DEGRADED));
    }

    #[tokio::test]
    async fn audit_records_final_counts() {
        let store = MockSearchStore::new().with_candidates(vec![
            candidate(1, 0.1, "a"),
            candidate(2, 0.2, "b"),
        ]);
        let engine = engine(store.clone(), MockReranker::returning(vec![0.9, 0.8]));

        let mut request = SearchRequest::new("question");
        request.theme = Some("RSE".into());
        engine.hybrid_search(&request).await.unwrap();

        let logged = store.logged();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].query_text, "question");
        assert_eq!(logged[0].theme.as_deref(), Some("RSE"));
        assert_eq!(logged[0].results_count, 2);
    }

    #[tokio::test]
    async fn audit_can_be_disabled() {
        let store = MockSearchStore::new().with_candidates(vec![candidate(1, 0.1, "a")]);
        let config = SearchConfig {
            log_search_queries: false,
            ..Default::default()
        };
        let engine = SearchEngine::new(
            MockEmbedder::default(),
            MockReranker::default(),
            store.clone(),
            config,
        );

        engine
            .hybrid_search(&SearchRequest::new("question"))
            .await
            .unwrap();
        assert!(store.logged().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let store = MockSearchStore::new().with_failing_fetch();
        let engine = engine(store, MockReranker::default());

        let outcome = engine.hybrid_search(&SearchRequest::new("question")).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn metadata_filters_reach_the_store() {
        let mut rows = vec![candidate(1, 0.1, "a"), candidate(2, 0.2, "b")];
        rows[1].theme = Some("Finance".into());
        let store = MockSearchStore::new().with_candidates(rows);
        let engine = engine(store, MockReranker::default());

        let mut request = SearchRequest::new("question");
        request.theme = Some("RSE".into());
        let response = engine.hybrid_search(&request).await.unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].chunk_id, 1);
    }
}
