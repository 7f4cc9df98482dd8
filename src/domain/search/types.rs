//! Core types for the hybrid search domain.

use serde::{Deserialize, Serialize};
use time::Date;

fn default_top_k() -> i64 {
    10
}

/// Parameters of a hybrid search.
///
/// All filters are optional; an absent `corpus_id` searches every corpus.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub corpus_id: Option<String>,
    pub hierarchy_level: Option<i32>,
    #[serde(default)]
    pub hierarchical: bool,
    #[serde(default)]
    pub filter_by_relevance: bool,
    #[serde(default)]
    pub normalize_scores: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            theme: None,
            document_type: None,
            start_date: None,
            end_date: None,
            corpus_id: None,
            hierarchy_level: None,
            hierarchical: false,
            filter_by_relevance: false,
            normalize_scores: false,
        }
    }
}

/// A ranked chunk returned by the search engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResult {
    pub chunk_id: i64,
    pub document_id: i64,
    pub title: String,
    pub content: String,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub publish_date: Option<Date>,
    pub score: f32,
    pub hierarchy_level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HierarchicalContext>,
}

/// Parent chunks of a result, keyed by hierarchy level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchicalContext {
    pub level_0: Option<ParentChunk>,
    pub level_1: Option<ParentChunk>,
    pub level_2: Option<ParentChunk>,
}

impl HierarchicalContext {
    pub fn is_empty(&self) -> bool {
        self.level_0.is_none() && self.level_1.is_none() && self.level_2.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentChunk {
    pub id: i64,
    pub content: String,
    pub hierarchy_level: i32,
}

/// Summary statistics over the top scores of a result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    pub median: f32,
}

/// Confidence classification of a result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceMetrics {
    pub level: f32,
    pub message: String,
    pub stats: ScoreStats,
}

/// Response of a hybrid search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub query: String,
    pub top_k: i64,
    pub total_results: usize,
    pub results: Vec<ChunkResult>,
    pub confidence: ConfidenceMetrics,
    pub normalized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A candidate row from the vector-distance SQL stage, before reranking.
#[derive(Debug, Clone)]
pub struct CandidateRow {
    pub chunk_id: i64,
    pub document_id: i64,
    pub content: String,
    pub hierarchy_level: i32,
    pub title: String,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub publish_date: Option<Date>,
    /// Cosine distance to the query embedding; `None` for rows without one.
    pub distance: Option<f64>,
}

/// An append-only audit record of one executed search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRecord {
    pub query_text: String,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub corpus_id: Option<String>,
    pub results_count: i32,
    pub confidence_level: f32,
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_deserializes_with_defaults() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "climat"}"#).unwrap();
        assert_eq!(request.query, "climat");
        assert_eq!(request.top_k, 10);
        assert!(!request.hierarchical);
        assert!(request.theme.is_none());
    }

    #[test]
    fn response_serializes_camel_case() {
        let response = SearchResponse {
            query: "q".into(),
            top_k: 5,
            total_results: 0,
            results: vec![],
            confidence: ConfidenceMetrics {
                level: 0.1,
                message: "m".into(),
                stats: ScoreStats::default(),
            },
            normalized: false,
            message: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("topK").is_some());
        assert!(json.get("totalResults").is_some());
        assert!(json.get("message").is_none());
    }
}
