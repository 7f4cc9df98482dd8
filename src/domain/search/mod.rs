//! Hybrid search - semantic vector search with metadata filtering and
//! cross-encoder reranking.
//!
//! The pipeline combines:
//! - **SQL metadata filters** (theme, document type, dates, corpus)
//! - **pgvector cosine distance** against the corpus's ANN index
//! - **Cross-encoder reranking** over an expanded candidate pool (top-k × 3)
//! - **Confidence classification** of the final score vector
//!
//! # Architecture
//!
//! The engine is built around trait abstractions for testability:
//!
//! - [`Embedder`] - query/content embedding generation (HTTP, mock)
//! - [`Reranker`] - (query, passage) scoring (HTTP, mock)
//! - [`SearchStore`] - database operations (PostgreSQL, mock)
//!
//! # Example
//!
//! ```ignore
//! use clea_api::domain::search::{SearchConfig, SearchEngine, SearchRequest};
//! use clea_api::domain::search::embedder::HttpEmbedder;
//! use clea_api::domain::search::reranker::HttpReranker;
//! use clea_api::domain::search::store::PgSearchStore;
//!
//! let engine = SearchEngine::new(embedder, reranker, store, SearchConfig::default());
//! let response = engine.hybrid_search(&SearchRequest::new("risques climatiques")).await?;
//! ```

mod confidence;
mod engine;
mod traits;
mod types;

pub mod embedder;
pub mod reranker;
pub mod store;

pub use confidence::{
    evaluate_confidence, normalize_scores, score_stats, HIGH_CONFIDENCE, MIN_RELEVANCE,
    MSG_GOOD, MSG_HIGH, MSG_MEDIUM, MSG_OFF_DOMAIN,
};
pub use engine::{SearchConfig, SearchEngine, MSG_EMBEDDER_UNAVAILABLE, MSG_RERANKER_DEGRADED};
pub use traits::{Embedder, ModelError, Reranker, SearchError, SearchStore};
pub use types::{
    CandidateRow, ChunkResult, ConfidenceMetrics, HierarchicalContext, ParentChunk, ScoreStats,
    SearchRecord, SearchRequest, SearchResponse,
};
