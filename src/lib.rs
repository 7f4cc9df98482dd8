//! Cléa API - hybrid document search over PostgreSQL + pgvector.
//!
//! Documents are sliced into a four-level chunk tree
//! ([`domain::segment`]), persisted with dense embeddings
//! ([`repositories`]), indexed per corpus with IVFFLAT/HNSW projections
//! ([`domain::index`]) and served through a hybrid retrieval pipeline
//! combining metadata filters, vector distance, cross-encoder reranking
//! and confidence scoring ([`domain::search`]).

pub mod app_state;
pub mod config;
pub mod domain;
pub mod repositories;
pub mod router;
mod routes;

pub use app_state::AppState;
