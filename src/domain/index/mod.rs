//! Corpus-scoped vector index lifecycle: creation over materialized
//! projections, staleness tracking and orphan reclamation.

mod manager;
mod sweeper;

pub use manager::{
    index_name, ivf_lists, projection_name, sanitize_corpus_id, CleanupReport, IndexError,
    IndexManager, IndexOutcome, IndexStatus, IndexType,
};
pub use sweeper::run_orphan_sweeper;
