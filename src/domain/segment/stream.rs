//! Lazy chunk streams: the hierarchical semantic walk and the sliding
//! window fallback.

use std::collections::HashSet;

use super::analysis::{self, floor_char_boundary, trim_span, Section, TextSpan};
use super::{
    ChunkDraft, SegmentError, MAX_CHUNKS, MAX_CHUNK_SIZE, MAX_LEVEL3_CHUNKS_PER_PARAGRAPH,
    MAX_TEXT_LENGTH, MIN_LEVEL3_LENGTH,
};

const MAX_SECTIONS: usize = 20;
const MAX_PARAGRAPHS_PER_SECTION: usize = 20;
const DEFAULT_MAX_LENGTH: usize = 1_000;

fn normalize_max_length(max_length: usize) -> usize {
    if max_length == 0 {
        DEFAULT_MAX_LENGTH
    } else {
        max_length.min(MAX_CHUNK_SIZE)
    }
}

/// Preview budget for the level-0 chunk: ~20 % of the document, capped.
fn root_preview_budget(len: usize) -> usize {
    (len / 5).clamp(200, 1_000)
}

fn cap_content(content: &str, limit: usize) -> String {
    if content.len() <= limit {
        return content.to_string();
    }
    let cut = floor_char_boundary(content, limit);
    content[..cut].trim_end().to_string()
}

/// Segments a document, choosing the fallback path when the semantic walk
/// produced nothing beyond the root preview.
///
/// Fails with [`SegmentError::InputTooLarge`] when the text exceeds
/// [`MAX_TEXT_LENGTH`]. Empty input yields a single empty root chunk.
pub fn segment_stream(
    text: &str,
    max_length: usize,
) -> Result<Box<dyn Iterator<Item = ChunkDraft> + Send + '_>, SegmentError> {
    if text.len() > MAX_TEXT_LENGTH {
        return Err(SegmentError::InputTooLarge(text.len()));
    }

    let mut semantic = SemanticStream::new(text, max_length);
    let mut head = Vec::with_capacity(2);
    for _ in 0..2 {
        match semantic.next() {
            Some(chunk) => head.push(chunk),
            None => break,
        }
    }

    if head.len() >= 2 {
        Ok(Box::new(head.into_iter().chain(semantic)))
    } else {
        Ok(Box::new(FallbackStream::new(text, max_length)))
    }
}

/// Streaming hierarchical segmentation.
///
/// Emits the level-0 preview first, then walks sections, their paragraphs
/// and the level-3 chunks of long paragraphs. Section and paragraph
/// material is computed on demand so peak memory stays proportional to a
/// single paragraph's chunk batch, not to the document.
pub struct SemanticStream<'a> {
    text: &'a str,
    max_length: usize,
    next_index: usize,
    root_emitted: bool,
    sections: Option<Vec<Section>>,
    section_cursor: usize,
    seen_sections: HashSet<String>,
    current_section: Option<SectionCtx>,
    done: bool,
}

struct SectionCtx {
    stream_index: usize,
    paragraphs: Vec<TextSpan>,
    para_cursor: usize,
    seen_paragraphs: HashSet<String>,
    current_para: Option<ParaCtx>,
}

struct ParaCtx {
    stream_index: usize,
    spans: std::vec::IntoIter<TextSpan>,
    seen: HashSet<String>,
}

impl<'a> SemanticStream<'a> {
    pub fn new(text: &'a str, max_length: usize) -> Self {
        Self {
            text,
            max_length: normalize_max_length(max_length),
            next_index: 0,
            root_emitted: false,
            sections: None,
            section_cursor: 0,
            seen_sections: HashSet::new(),
            current_section: None,
            done: false,
        }
    }
}

impl Iterator for SemanticStream<'_> {
    type Item = ChunkDraft;

    fn next(&mut self) -> Option<ChunkDraft> {
        if self.done || self.next_index >= MAX_CHUNKS {
            self.done = true;
            return None;
        }

        if !self.root_emitted {
            self.root_emitted = true;
            let budget = root_preview_budget(self.text.len());
            let content = analysis::meaningful_preview(self.text, budget)
                .trim()
                .to_string();
            self.next_index += 1;
            return Some(ChunkDraft {
                content,
                start_char: 0,
                end_char: self.text.len(),
                hierarchy_level: 0,
                parent_index: None,
            });
        }

        loop {
            if self.next_index >= MAX_CHUNKS {
                self.done = true;
                return None;
            }

            // Drain the level-3 chunks of the paragraph in progress.
            if let Some(section) = self.current_section.as_mut() {
                if let Some(para) = section.current_para.as_mut() {
                    let mut next_chunk = None;
                    for span in para.spans.by_ref() {
                        let content = self.text[span.start..span.end].trim();
                        if content.is_empty() || !para.seen.insert(content.to_string()) {
                            continue;
                        }
                        next_chunk = Some(ChunkDraft {
                            content: content.to_string(),
                            start_char: span.start,
                            end_char: span.end,
                            hierarchy_level: 3,
                            parent_index: Some(para.stream_index),
                        });
                        break;
                    }
                    match next_chunk {
                        Some(chunk) => {
                            self.next_index += 1;
                            return Some(chunk);
                        }
                        None => section.current_para = None,
                    }
                }

                // Advance to the next paragraph of the current section.
                let mut next_chunk = None;
                while section.para_cursor < section.paragraphs.len() {
                    let span = section.paragraphs[section.para_cursor];
                    section.para_cursor += 1;

                    let raw = &self.text[span.start..span.end];
                    let content = raw.trim();
                    if content.is_empty() || !section.seen_paragraphs.insert(content.to_string()) {
                        continue;
                    }

                    let stream_index = self.next_index;
                    if raw.len() >= MIN_LEVEL3_LENGTH {
                        let overlap = (self.max_length / 10).max(50);
                        let spans = analysis::create_semantic_chunks(
                            raw,
                            self.max_length,
                            overlap,
                            span.start,
                            MAX_LEVEL3_CHUNKS_PER_PARAGRAPH,
                        );
                        section.current_para = Some(ParaCtx {
                            stream_index,
                            spans: spans.into_iter(),
                            seen: HashSet::new(),
                        });
                    }

                    next_chunk = Some(ChunkDraft {
                        content: cap_content(content, MAX_CHUNK_SIZE),
                        start_char: span.start,
                        end_char: span.end,
                        hierarchy_level: 2,
                        parent_index: Some(section.stream_index),
                    });
                    break;
                }
                match next_chunk {
                    Some(chunk) => {
                        self.next_index += 1;
                        return Some(chunk);
                    }
                    None => self.current_section = None,
                }
            }

            // Advance to the next section.
            let text = self.text;
            let sections = self
                .sections
                .get_or_insert_with(|| analysis::extract_sections(text, MAX_SECTIONS));
            if self.section_cursor >= sections.len() {
                self.done = true;
                return None;
            }
            let section = sections[self.section_cursor].clone();
            self.section_cursor += 1;

            let body = section.body(self.text);
            let budget = self
                .max_length
                .min(MAX_CHUNK_SIZE.saturating_sub(section.title.len() + 2));
            let preview = analysis::meaningful_preview(body.trim(), budget);
            let content = if preview.trim().is_empty() {
                section.title.clone()
            } else {
                format!("{}\n\n{}", section.title, preview.trim())
            };
            if !self.seen_sections.insert(content.clone()) {
                continue;
            }

            let stream_index = self.next_index;
            let paragraphs =
                analysis::extract_paragraphs(body, section.body_start, MAX_PARAGRAPHS_PER_SECTION);
            self.current_section = Some(SectionCtx {
                stream_index,
                paragraphs,
                para_cursor: 0,
                seen_paragraphs: HashSet::new(),
                current_para: None,
            });

            self.next_index += 1;
            return Some(ChunkDraft {
                content,
                start_char: section.start,
                end_char: section.end,
                hierarchy_level: 1,
                parent_index: Some(0),
            });
        }
    }
}

/// Robust sliding-window segmentation used when the semantic walk finds no
/// structure: one root preview, then level-3 windows with ~10 % overlap,
/// cut points snapped to sentence or paragraph boundaries nearby.
pub struct FallbackStream<'a> {
    text: &'a str,
    max_length: usize,
    target: usize,
    overlap: usize,
    cursor: usize,
    emitted: usize,
    root_emitted: bool,
    done: bool,
}

impl<'a> FallbackStream<'a> {
    pub fn new(text: &'a str, max_length: usize) -> Self {
        let max_length = normalize_max_length(max_length);
        let target = (max_length * 2).min(MAX_CHUNK_SIZE);
        Self {
            text,
            max_length,
            target,
            overlap: target / 10,
            cursor: 0,
            emitted: 0,
            root_emitted: false,
            done: false,
        }
    }

    /// Picks a cut point near `end`: the closest sentence boundary within a
    /// ±10 % window, else the closest paragraph break, else a word break.
    fn snap_cut(&self, end: usize) -> usize {
        let window = self.target / 10;
        let lo = floor_char_boundary(self.text, (self.cursor + 1).max(end.saturating_sub(window)));
        let hi = floor_char_boundary(
            self.text,
            self.text
                .len()
                .min(end + window)
                .min(self.cursor + MAX_CHUNK_SIZE),
        );

        let mut best: Option<usize> = None;
        for pos in lo..hi {
            if analysis::is_sentence_boundary(self.text, pos) {
                let candidate = pos + 1;
                let better = match best {
                    Some(current) => candidate.abs_diff(end) < current.abs_diff(end),
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        if let Some(cut) = best {
            return cut;
        }

        let mut best: Option<usize> = None;
        for boundary in analysis::find_paragraph_boundaries(&self.text[lo..hi]) {
            let candidate = lo + boundary + 1;
            let better = match best {
                Some(current) => candidate.abs_diff(end) < current.abs_diff(end),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
        if let Some(cut) = best {
            return cut;
        }

        if let Some(space) = self.text[lo..end].rfind(' ') {
            return lo + space + 1;
        }
        end
    }
}

impl Iterator for FallbackStream<'_> {
    type Item = ChunkDraft;

    fn next(&mut self) -> Option<ChunkDraft> {
        if self.done || self.emitted >= MAX_CHUNKS {
            return None;
        }

        if !self.root_emitted {
            self.root_emitted = true;
            self.emitted += 1;
            let preview_end = floor_char_boundary(self.text, self.text.len().min(1_000));
            if self.text.len() <= self.max_length * 3 / 2 {
                self.done = true;
            }
            return Some(ChunkDraft {
                content: self.text[..preview_end].trim().to_string(),
                start_char: 0,
                end_char: self.text.len(),
                hierarchy_level: 0,
                parent_index: None,
            });
        }

        while self.cursor < self.text.len() {
            let hard_end = floor_char_boundary(self.text, self.cursor + self.target);
            let end = if hard_end < self.text.len() {
                self.snap_cut(hard_end)
            } else {
                hard_end
            };

            let span = trim_span(self.text, self.cursor, end);

            // Advance with overlap, always making progress.
            let next = end.saturating_sub(self.overlap).max(self.cursor + 1);
            self.cursor = analysis::ceil_char_boundary(self.text, next);
            if end >= self.text.len() {
                self.done = true;
            }

            if !span.is_empty() {
                self.emitted += 1;
                return Some(ChunkDraft {
                    content: self.text[span.start..span.end].to_string(),
                    start_char: span.start,
                    end_char: span.end,
                    hierarchy_level: 3,
                    parent_index: Some(0),
                });
            }
            if self.done {
                break;
            }
        }

        self.done = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, max_length: usize) -> Vec<ChunkDraft> {
        segment_stream(text, max_length).unwrap().collect()
    }

    fn assert_tree_invariants(text: &str, chunks: &[ChunkDraft]) {
        assert!(chunks.len() <= MAX_CHUNKS);
        let mut last_start = vec![0usize; 4];
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.start_char <= chunk.end_char);
            assert!(chunk.end_char <= text.len());
            assert!(chunk.content.len() <= MAX_CHUNK_SIZE);
            assert!((0..=3).contains(&chunk.hierarchy_level));

            let level = chunk.hierarchy_level as usize;
            assert!(
                chunk.start_char >= last_start[level],
                "positions must be monotone within level {level}"
            );
            last_start[level] = chunk.start_char;

            match chunk.parent_index {
                None => assert_eq!(chunk.hierarchy_level, 0),
                Some(parent) => {
                    assert!(parent < i, "parent must appear earlier in the stream");
                    assert!(
                        chunks[parent].hierarchy_level < chunk.hierarchy_level,
                        "parent must sit at a strictly lower level"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_input_yields_single_empty_root() {
        let chunks = collect("", 1_000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].hierarchy_level, 0);
        assert_eq!(chunks[0].content, "");
        assert_eq!((chunks[0].start_char, chunks[0].end_char), (0, 0));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let text = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert!(matches!(
            segment_stream(&text, 1_000),
            Err(SegmentError::InputTooLarge(_))
        ));
    }

    #[test]
    fn input_at_limit_is_accepted() {
        let text = "x".repeat(MAX_TEXT_LENGTH);
        assert!(segment_stream(&text, 1_000).is_ok());
    }

    #[test]
    fn small_txt_document_produces_expected_hierarchy() {
        let text = "Intro\n\nSection A\n\nPara 1.\n\nPara 2.\n\nSection B\n\nPara 3.";
        let chunks = collect(text, 200);
        assert_tree_invariants(text, &chunks);

        let count = |level| {
            chunks
                .iter()
                .filter(|c| c.hierarchy_level == level)
                .count()
        };
        assert_eq!(count(0), 1);
        assert!(count(1) >= 2, "expected at least 2 sections, got {}", count(1));
        assert!(count(2) >= 3, "expected at least 3 paragraphs, got {}", count(2));
        assert_eq!(count(3), 0, "paragraphs are too short for level-3 chunks");
    }

    #[test]
    fn long_paragraphs_produce_level3_chunks() {
        let para = "Une phrase utile pour le decoupage semantique du texte. ".repeat(20);
        let text = format!(
            "# Premiere section\n\n{para}\n\n# Deuxieme section\n\n{para}\n\n# Troisieme section\n\n{para}"
        );
        let chunks = collect(&text, 200);
        assert_tree_invariants(&text, &chunks);

        let level3: Vec<_> = chunks.iter().filter(|c| c.hierarchy_level == 3).collect();
        assert!(!level3.is_empty());
        for chunk in &level3 {
            assert!(chunk.content.len() <= 200 + 2);
            let parent = &chunks[chunk.parent_index.unwrap()];
            assert_eq!(parent.hierarchy_level, 2);
            assert!(chunk.start_char >= parent.start_char);
            assert!(chunk.end_char <= parent.end_char);
        }
    }

    #[test]
    fn duplicate_sections_are_suppressed() {
        let text = "# Titre\n\nContenu duplique dans deux sections identiques du texte.\n\n# Titre\n\nContenu duplique dans deux sections identiques du texte.\n\n# Autre\n\nContenu distinct pour la troisieme section du document.";
        let chunks = collect(text, 500);
        let titles: Vec<_> = chunks
            .iter()
            .filter(|c| c.hierarchy_level == 1)
            .map(|c| c.content.clone())
            .collect();
        let unique: std::collections::HashSet<_> = titles.iter().cloned().collect();
        assert_eq!(titles.len(), unique.len(), "level-1 contents must be unique");
    }

    #[test]
    fn chunk_cap_is_enforced() {
        let mut text = String::new();
        for s in 0..20 {
            text.push_str(&format!("# Section numero {s}\n\n"));
            for p in 0..20 {
                for q in 0..30 {
                    text.push_str(&format!(
                        "Phrase distincte {s}-{p}-{q} pour grossir le paragraphe analyse. "
                    ));
                }
                text.push_str("\n\n");
            }
        }
        let chunks: Vec<_> = SemanticStream::new(&text, 100).collect();
        assert_eq!(chunks.len(), MAX_CHUNKS);
    }

    #[test]
    fn fallback_emits_sliding_windows_under_root() {
        let text = "Une phrase de remplissage pour le mode de secours. ".repeat(100);
        let chunks: Vec<_> = FallbackStream::new(&text, 500).collect();
        assert_tree_invariants(&text, &chunks);

        assert_eq!(chunks[0].hierarchy_level, 0);
        let windows = &chunks[1..];
        assert!(windows.len() > 1);
        for chunk in windows {
            assert_eq!(chunk.hierarchy_level, 3);
            assert_eq!(chunk.parent_index, Some(0));
            // Window size plus the ±10 % snapping slack.
            assert!(chunk.content.len() <= 1_100);
        }
        // Consecutive windows overlap or at least touch.
        for pair in windows.windows(2) {
            assert!(pair[1].start_char <= pair[0].end_char);
            assert!(pair[1].start_char > pair[0].start_char);
        }
        // Tail coverage.
        assert!(windows.last().unwrap().end_char >= text.trim_end().len());
    }

    #[test]
    fn fallback_short_text_stops_after_root() {
        let text = "Texte court sans structure.";
        let chunks: Vec<_> = FallbackStream::new(text, 500).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].hierarchy_level, 0);
    }

    #[test]
    fn semantic_stream_is_lazy_for_large_documents() {
        let text = "Un paragraphe de contenu substantiel pour la segmentation. ".repeat(100_000);
        let mut stream = SemanticStream::new(&text, 1_000);
        // Pulling a handful of chunks must not require walking the whole
        // document.
        for _ in 0..5 {
            assert!(stream.next().is_some());
        }
    }
}
