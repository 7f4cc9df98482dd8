//! Hierarchical document segmentation.
//!
//! A document is cut into a four-level chunk tree:
//!
//! - level 0: one preview chunk for the whole document
//! - level 1: sections
//! - level 2: paragraphs
//! - level 3: fine-grained overlapping chunks carrying the embeddings
//!
//! Segmentation is lazy: [`segment_stream`] yields [`ChunkDraft`]s one at a
//! time so multi-megabyte documents never have to be materialized as a
//! chunk list. Parent links are carried as positions within the stream
//! (an arena of indices, not pointers) and resolved to database ids by the
//! store at insert time.

mod analysis;
mod stream;

pub use analysis::{
    create_semantic_chunks, extract_paragraphs, extract_sections, find_paragraph_boundaries,
    is_sentence_boundary, meaningful_preview, Section, TextSpan,
};
pub use stream::{segment_stream, FallbackStream, SemanticStream};

/// Hard cap on the number of chunks emitted for one document.
pub const MAX_CHUNKS: usize = 5_000;
/// Largest accepted input text, in bytes.
pub const MAX_TEXT_LENGTH: usize = 20_000_000;
/// Largest stored chunk content, in bytes.
pub const MAX_CHUNK_SIZE: usize = 8_000;
/// A paragraph shorter than this gets no level-3 children.
pub const MIN_LEVEL3_LENGTH: usize = 200;
/// Cap on level-3 chunks derived from a single paragraph.
pub const MAX_LEVEL3_CHUNKS_PER_PARAGRAPH: usize = 100;
/// Above this size, structure detection only scans the head of the text.
pub const LARGE_THRESHOLD_BYTES: usize = 5_000_000;

/// A chunk produced by segmentation, not yet persisted.
///
/// `parent_index` points at an earlier chunk in the same stream; the store
/// maps it to a database id during insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub content: String,
    pub start_char: usize,
    pub end_char: usize,
    pub hierarchy_level: i32,
    pub parent_index: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("input text of {0} bytes exceeds the {MAX_TEXT_LENGTH} byte limit")]
    InputTooLarge(usize),
}
