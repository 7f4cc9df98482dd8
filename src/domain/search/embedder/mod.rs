//! Embedding generation implementations.

mod http;
mod mock;

pub use http::HttpEmbedder;
pub use mock::MockEmbedder;

/// Dimensions of the dense vectors stored in the chunk table.
pub const EMBEDDING_DIMENSIONS: usize = 768;
