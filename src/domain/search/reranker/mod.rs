//! Cross-encoder reranking implementations.

mod http;
mod mock;

pub use http::HttpReranker;
pub use mock::MockReranker;
