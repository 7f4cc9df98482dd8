//! Structural text analysis: section, paragraph and fine-chunk extraction.
//!
//! Everything here is a pure function over `&str`. Positions are byte
//! offsets into the source text, always snapped to UTF-8 character
//! boundaries, so spans can be sliced back out of the original document
//! without copying.

use regex::Regex;
use std::sync::LazyLock;

/// Markdown-style `# Title` headers.
static HASH_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(\S.*)$").unwrap());
/// Setext headers: a short line underlined by a run of `=` or `-`.
static SETEXT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([^\n]{1,70})\n(={3,}|-{3,})[ \t]*$").unwrap());
/// Two or more consecutive blank lines.
static STRONG_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n(?:[ \t\r]*\n)+").unwrap());
/// A single blank line between paragraphs.
static PARAGRAPH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
/// End-of-sentence punctuation followed by whitespace.
static SENTENCE_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Words that flag a sentence as worth keeping in a preview.
const KEY_MARKERS: &[&str] = &["clé", "essentiel", "important", "crucial", "principal"];

/// Fragments shorter than this get merged with their neighbour.
const MIN_FRAGMENT_LEN: usize = 80;

/// Target size of an artificial section when the text has no structure.
const ARTIFICIAL_SECTION_SIZE: usize = 50_000;

/// A detected section: the title line plus the byte range it governs.
///
/// `start..end` covers the whole region (header line included);
/// `body_start..end` is the content below the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub start: usize,
    pub body_start: usize,
    pub end: usize,
}

impl Section {
    pub fn body<'t>(&self, text: &'t str) -> &'t str {
        &text[self.body_start..self.end]
    }
}

/// A contiguous span of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Largest char-boundary offset `<= i`.
pub(crate) fn floor_char_boundary(text: &str, i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    let mut i = i;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char-boundary offset `>= i`.
pub(crate) fn ceil_char_boundary(text: &str, i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    let mut i = i;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Shrinks a span so it neither starts nor ends on whitespace.
pub(crate) fn trim_span(text: &str, mut start: usize, mut end: usize) -> TextSpan {
    let slice = &text[start..end];
    let trimmed_start = slice.len() - slice.trim_start().len();
    let trimmed_end = slice.len() - slice.trim_end().len();
    start += trimmed_start;
    end -= trimmed_end;
    if start > end {
        end = start;
    }
    TextSpan { start, end }
}

fn truncate_title(line: &str) -> String {
    let line = line.trim();
    if line.len() <= 100 {
        return line.to_string();
    }
    let cut = floor_char_boundary(line, 97);
    format!("{}...", &line[..cut])
}

fn first_line_title(region: &str, fallback: &str) -> String {
    region
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(truncate_title)
        .unwrap_or_else(|| fallback.to_string())
}

/// Detects the section structure of a document.
///
/// Three strategies, in order: formal headers (hash markers and setext
/// underlines), strong blank-line separators when fewer than three headers
/// were found, and equal-sized blocks when the text has no usable structure
/// at all. The result is clipped to `max_sections`.
pub fn extract_sections(text: &str, max_sections: usize) -> Vec<Section> {
    if text.trim().is_empty() || max_sections == 0 {
        return vec![];
    }

    // Structure detection only scans the head of very large texts; the tail
    // still ends up inside the last detected section.
    let scan_end = floor_char_boundary(text, text.len().min(super::LARGE_THRESHOLD_BYTES));
    let scan = &text[..scan_end];

    let headers = find_headers(scan, max_sections * 3);
    if headers.len() >= 3 {
        return sections_from_headers(text, headers, max_sections);
    }

    let mut regions = split_on_strong_separators(scan);
    if let Some(last) = regions.last_mut() {
        if scan_end < text.len() {
            last.end = text.len();
        }
    }
    if regions.len() >= 2 {
        return regions
            .into_iter()
            .take(max_sections)
            .map(|span| Section {
                title: first_line_title(&text[span.start..span.end], "Section"),
                start: span.start,
                body_start: span.start,
                end: span.end,
            })
            .collect();
    }

    equal_blocks(text, max_sections)
}

/// A header match: title text plus the byte range of the header lines.
struct Header {
    title: String,
    start: usize,
    end: usize,
}

fn find_headers(text: &str, limit: usize) -> Vec<Header> {
    let mut headers: Vec<Header> = Vec::new();

    for caps in HASH_HEADER.captures_iter(text).take(limit) {
        let whole = caps.get(0).unwrap();
        headers.push(Header {
            title: caps[2].trim().to_string(),
            start: whole.start(),
            end: whole.end(),
        });
    }

    for caps in SETEXT_HEADER.captures_iter(text).take(limit) {
        let title = caps[1].trim();
        let underline = &caps[2];
        // The underline must be at least as long as the title itself.
        if title.is_empty() || title.starts_with('#') || underline.len() < title.len() {
            continue;
        }
        let whole = caps.get(0).unwrap();
        headers.push(Header {
            title: title.to_string(),
            start: whole.start(),
            end: whole.end(),
        });
    }

    headers.sort_by_key(|h| h.start);
    headers.dedup_by_key(|h| h.start);
    headers.truncate(limit);
    headers
}

fn sections_from_headers(text: &str, headers: Vec<Header>, max_sections: usize) -> Vec<Section> {
    let mut sections = Vec::new();

    // Text before the first header becomes an introduction when substantial.
    let intro_end = headers[0].start;
    if text[..intro_end].trim().len() > 50 {
        sections.push(Section {
            title: "Introduction".to_string(),
            start: 0,
            body_start: 0,
            end: intro_end,
        });
    }

    for (i, header) in headers.iter().enumerate() {
        let next_start = headers
            .get(i + 1)
            .map(|h| h.start)
            .unwrap_or_else(|| text.len());
        sections.push(Section {
            title: header.title.clone(),
            start: header.start,
            body_start: header.end.min(next_start),
            end: next_start,
        });
    }

    sections.truncate(max_sections);
    sections
}

fn split_on_strong_separators(text: &str) -> Vec<TextSpan> {
    let mut regions = Vec::new();
    let mut cursor = 0;
    for m in STRONG_SEPARATOR.find_iter(text) {
        let span = trim_span(text, cursor, m.start());
        if !span.is_empty() {
            regions.push(span);
        }
        cursor = m.end();
    }
    let last = trim_span(text, cursor, text.len());
    if !last.is_empty() {
        regions.push(last);
    }
    regions
}

/// Last-resort division into roughly equal blocks, snapped to line breaks.
fn equal_blocks(text: &str, max_sections: usize) -> Vec<Section> {
    if text.len() < 2 {
        return vec![Section {
            title: first_line_title(text, "Document"),
            start: 0,
            body_start: 0,
            end: text.len(),
        }];
    }

    let count = (text.len() / ARTIFICIAL_SECTION_SIZE).clamp(2, max_sections.max(2));
    let block_size = text.len() / count;
    let mut sections = Vec::with_capacity(count);
    let mut start = 0;

    for i in 0..count {
        let mut end = if i + 1 == count {
            text.len()
        } else {
            floor_char_boundary(text, (i + 1) * block_size)
        };
        // Prefer to cut right after a line break close to the target.
        if end < text.len() {
            if let Some(nl) = text[end..text.len().min(end + 200)].find('\n') {
                end += nl + 1;
            }
        }
        if end <= start {
            continue;
        }
        let region = &text[start..end];
        let title = region
            .lines()
            .find(|l| {
                let t = l.trim();
                t.len() > 5 && t.len() < 80
            })
            .map(truncate_title)
            .unwrap_or_else(|| format!("Section {}", i + 1));
        sections.push(Section {
            title,
            start,
            body_start: start,
            end,
        });
        start = end;
        if start >= text.len() {
            break;
        }
    }

    sections
}

/// Splits a text into coherent paragraphs.
///
/// Blank-line separation first; when that produces fewer than two pieces the
/// text is regrouped along sentence boundaries instead. Adjacent fragments
/// shorter than 80 chars are merged, but merging never collapses a
/// multi-block split into a single paragraph. Returned offsets are
/// translated by `base_offset`.
pub fn extract_paragraphs(text: &str, base_offset: usize, max_paragraphs: usize) -> Vec<TextSpan> {
    if text.trim().is_empty() || max_paragraphs == 0 {
        return vec![];
    }

    let mut blocks = split_on_blank_lines(text);
    if blocks.len() < 2 {
        let ideal = (text.len() / max_paragraphs.max(1)).clamp(200, 1000);
        let by_sentence = group_sentences(text, ideal);
        if by_sentence.len() > blocks.len() {
            blocks = by_sentence;
        }
    }

    let merged = merge_small_fragments(blocks.clone());
    let mut spans = if merged.len() < 2 && blocks.len() >= 2 {
        blocks
    } else {
        merged
    };

    spans.truncate(max_paragraphs);
    for span in &mut spans {
        span.start += base_offset;
        span.end += base_offset;
    }
    spans
}

fn split_on_blank_lines(text: &str) -> Vec<TextSpan> {
    let mut blocks = Vec::new();
    let mut cursor = 0;
    for m in PARAGRAPH_SEPARATOR.find_iter(text) {
        let span = trim_span(text, cursor, m.start());
        if !span.is_empty() {
            blocks.push(span);
        }
        cursor = m.end();
    }
    let last = trim_span(text, cursor, text.len());
    if !last.is_empty() {
        blocks.push(last);
    }
    blocks
}

/// Groups whole sentences into spans of roughly `ideal` bytes.
fn group_sentences(text: &str, ideal: usize) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut group_start = 0;
    let mut cursor = 0;

    while cursor < text.len() {
        if is_sentence_boundary(text, cursor) {
            let sentence_end = cursor + 1;
            if sentence_end - group_start >= ideal {
                let span = trim_span(text, group_start, sentence_end);
                if !span.is_empty() {
                    spans.push(span);
                }
                group_start = sentence_end;
            }
        }
        cursor = ceil_char_boundary(text, cursor + 1);
    }

    let last = trim_span(text, group_start, text.len());
    if !last.is_empty() {
        spans.push(last);
    }
    spans
}

/// Coalesces runs of adjacent fragments that are all below the minimum.
fn merge_small_fragments(blocks: Vec<TextSpan>) -> Vec<TextSpan> {
    let mut merged: Vec<TextSpan> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(last) if last.len() < MIN_FRAGMENT_LEN && block.len() < MIN_FRAGMENT_LEN => {
                last.end = block.end;
            }
            _ => merged.push(block),
        }
    }
    merged
}

/// Cuts a text into overlapping chunks targeting `max_length` bytes.
///
/// Cut points prefer sentence boundaries, then paragraph boundaries, then
/// word boundaries in the back half of the window. The effective overlap is
/// clamped to `[min_overlap, max_length / 4]`.
pub fn create_semantic_chunks(
    text: &str,
    max_length: usize,
    min_overlap: usize,
    base_offset: usize,
    max_chunks: usize,
) -> Vec<TextSpan> {
    if text.trim().is_empty() || max_chunks == 0 || max_length == 0 {
        return vec![];
    }
    if text.len() <= max_length {
        let span = trim_span(text, 0, text.len());
        return vec![TextSpan {
            start: span.start + base_offset,
            end: span.end + base_offset,
        }];
    }

    let effective_overlap = min_overlap.min(max_length / 4);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() && chunks.len() < max_chunks {
        let hard_end = floor_char_boundary(text, start + max_length);
        let end = if hard_end < text.len() {
            let window_start = floor_char_boundary(text, start + max_length / 2);
            find_cut_point(text, window_start, hard_end)
        } else {
            hard_end
        };

        let span = trim_span(text, start, end);
        if !span.is_empty() {
            chunks.push(TextSpan {
                start: span.start + base_offset,
                end: span.end + base_offset,
            });
        }

        if end >= text.len() {
            break;
        }
        let next = end.saturating_sub(effective_overlap).max(start + 1);
        start = ceil_char_boundary(text, next);
    }

    chunks
}

/// Best cut position in `window_start..end`: sentence end, then paragraph
/// break, then word boundary, then the hard limit itself.
fn find_cut_point(text: &str, window_start: usize, end: usize) -> usize {
    let mut pos = floor_char_boundary(text, end.saturating_sub(1));
    while pos > window_start {
        if is_sentence_boundary(text, pos) {
            return pos + 1;
        }
        pos = floor_char_boundary(text, pos.saturating_sub(1));
    }

    if let Some(m) = PARAGRAPH_SEPARATOR
        .find_iter(&text[window_start..end])
        .last()
    {
        return window_start + m.end();
    }

    if let Some(space) = text[window_start..end].rfind(' ') {
        return window_start + space + 1;
    }

    end
}

/// True iff `text[pos]` is `.`, `!` or `?` and the next character is
/// whitespace or the end of the text.
pub fn is_sentence_boundary(text: &str, pos: usize) -> bool {
    let bytes = text.as_bytes();
    if pos >= bytes.len() {
        return false;
    }
    if !matches!(bytes[pos], b'.' | b'!' | b'?') {
        return false;
    }
    match bytes.get(pos + 1) {
        None => true,
        Some(next) => next.is_ascii_whitespace(),
    }
}

/// Ordered start positions of every blank-line paragraph separator.
pub fn find_paragraph_boundaries(text: &str) -> Vec<usize> {
    PARAGRAPH_SEPARATOR
        .find_iter(text)
        .map(|m| m.start())
        .collect()
}

/// Builds a preview of a long text: the head, up to two key-marker
/// sentences from the middle, and the tail, truncated to `max_length`.
pub fn meaningful_preview(text: &str, max_length: usize) -> String {
    if text.len() <= max_length {
        return text.to_string();
    }
    if max_length == 0 {
        return String::new();
    }

    let head_end = floor_char_boundary(text, max_length / 3);
    let head = text[..head_end].trim();

    let middle_start = ceil_char_boundary(text, text.len() / 3);
    let middle_end = floor_char_boundary(text, 2 * text.len() / 3);
    let mut key_sentences = String::new();
    if middle_start < middle_end {
        let middle = &text[middle_start..middle_end];
        let mut kept = 0;
        for sentence in SENTENCE_SPLIT.split(middle) {
            let lower = sentence.to_lowercase();
            if KEY_MARKERS.iter().any(|marker| lower.contains(marker)) {
                key_sentences.push_str(sentence.trim());
                key_sentences.push_str(". ");
                kept += 1;
                if kept == 2 || key_sentences.len() > max_length / 6 {
                    break;
                }
            }
        }
    }

    let tail_start = ceil_char_boundary(text, text.len().saturating_sub(max_length / 6));
    let tail = text[tail_start..].trim();

    let mut preview = head.to_string();
    if !key_sentences.is_empty() {
        preview.push_str("\n[...]\n");
        preview.push_str(key_sentences.trim_end());
    }
    if preview.len() + tail.len() + 20 <= max_length {
        preview.push_str("\n[...]\n");
        preview.push_str(tail);
    }

    if preview.len() > max_length {
        let cut = floor_char_boundary(&preview, max_length);
        preview.truncate(cut);
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURED: &str = "# Premier titre\n\nContenu de la premiere section avec assez de texte pour compter.\n\n# Deuxieme titre\n\nContenu de la deuxieme section, egalement substantiel.\n\n# Troisieme titre\n\nContenu final du document analyse.";

    #[test]
    fn extract_sections_finds_hash_headers() {
        let sections = extract_sections(STRUCTURED, 20);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "Premier titre");
        assert_eq!(sections[2].title, "Troisieme titre");
        assert!(sections[0].body(STRUCTURED).contains("premiere section"));
    }

    #[test]
    fn extract_sections_are_ordered_and_contiguous() {
        let sections = extract_sections(STRUCTURED, 20);
        for pair in sections.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(sections.last().unwrap().end, STRUCTURED.len());
    }

    #[test]
    fn extract_sections_setext_requires_long_underline() {
        let text = "Titre important\n===============\n\nDu contenu ici.\n\nAutre titre\n===========\n\nEncore du contenu.\n\nDernier titre\n=============\n\nFin.";
        let sections = extract_sections(text, 20);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, "Titre important");

        // Underline shorter than the title is not a header.
        let not_header = "Une ligne assez longue pour un titre\n---\ntexte";
        assert!(find_headers(not_header, 10).is_empty());
    }

    #[test]
    fn extract_sections_falls_back_to_strong_separators() {
        let text = "Bloc un, premier contenu.\n\n\nBloc deux, second contenu.\n\n\nBloc trois, dernier contenu.";
        let sections = extract_sections(text, 20);
        assert_eq!(sections.len(), 3);
        assert!(sections[0].title.starts_with("Bloc un"));
    }

    #[test]
    fn extract_sections_divides_unstructured_text() {
        let text = "Intro\n\nSection A\n\nPara 1.\n\nPara 2.\n\nSection B\n\nPara 3.";
        let sections = extract_sections(text, 20);
        assert!(sections.len() >= 2, "expected at least two artificial blocks");
        let total: usize = sections.iter().map(|s| s.end - s.start).sum();
        assert_eq!(total, text.len());
    }

    #[test]
    fn extract_sections_clips_to_max() {
        let sections = extract_sections(STRUCTURED, 2);
        assert_eq!(sections.len(), 2);
    }

    #[test]
    fn extract_sections_empty_input() {
        assert!(extract_sections("", 20).is_empty());
        assert!(extract_sections("   \n  ", 20).is_empty());
    }

    #[test]
    fn extract_paragraphs_splits_on_blank_lines() {
        let a = "x".repeat(120);
        let b = "y".repeat(150);
        let text = format!("{a}\n\n{b}");
        let paragraphs = extract_paragraphs(&text, 0, 20);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(&text[paragraphs[0].start..paragraphs[0].end], a);
        assert_eq!(&text[paragraphs[1].start..paragraphs[1].end], b);
    }

    #[test]
    fn extract_paragraphs_translates_offsets() {
        let text = "Premier paragraphe assez long pour ne pas etre fusionne avec son voisin direct.\n\nSecond paragraphe egalement assez long pour rester une unite independante ici.";
        let paragraphs = extract_paragraphs(text, 100, 20);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].start, 100);
        assert!(paragraphs[1].start > 100);
    }

    #[test]
    fn extract_paragraphs_merges_small_fragments() {
        let long = "z".repeat(200);
        let text = format!("Court.\n\nAussi court.\n\n{long}");
        let paragraphs = extract_paragraphs(&text, 0, 20);
        // The two tiny fragments collapse together, the long block survives.
        assert_eq!(paragraphs.len(), 2);
    }

    #[test]
    fn extract_paragraphs_never_collapses_to_one() {
        let text = "Intro\n\nSection A\n\nPara 1.";
        let paragraphs = extract_paragraphs(text, 0, 20);
        assert!(paragraphs.len() >= 2);
    }

    #[test]
    fn extract_paragraphs_sentence_fallback() {
        let sentence = "Une phrase complete qui fait a peu pres quatre-vingts caracteres pour le test. ";
        let text = sentence.repeat(10);
        let paragraphs = extract_paragraphs(&text, 0, 20);
        assert!(paragraphs.len() >= 2, "got {}", paragraphs.len());
    }

    #[test]
    fn extract_paragraphs_empty_input() {
        assert!(extract_paragraphs("", 0, 20).is_empty());
    }

    #[test]
    fn semantic_chunks_short_text_is_single_span() {
        let text = "Un texte court.";
        let chunks = create_semantic_chunks(text, 100, 10, 0, 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(&text[chunks[0].start..chunks[0].end], text);
    }

    #[test]
    fn semantic_chunks_prefer_sentence_boundaries() {
        let text = "Premiere phrase du texte analyse. Deuxieme phrase du texte analyse. Troisieme phrase du texte analyse. Quatrieme phrase du texte analyse.";
        let chunks = create_semantic_chunks(text, 80, 10, 0, 20);
        assert!(chunks.len() >= 2);
        for chunk in &chunks[..chunks.len() - 1] {
            let content = &text[chunk.start..chunk.end];
            assert!(
                content.ends_with('.'),
                "chunk should end at a sentence: {content:?}"
            );
        }
    }

    #[test]
    fn semantic_chunks_respect_max_length_and_overlap() {
        let text = "Lorem ipsum dolor sit amet consectetur. ".repeat(50);
        let chunks = create_semantic_chunks(&text, 200, 50, 0, 100);
        for chunk in &chunks {
            assert!(chunk.len() <= 200);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start, "chunks must advance");
            assert!(pair[1].start < pair[0].end + 200, "no large gaps");
        }
        // Full coverage of the tail.
        assert!(chunks.last().unwrap().end >= text.trim_end().len());
    }

    #[test]
    fn semantic_chunks_overlap_is_clamped() {
        // min_overlap far above max_length / 4 must still make progress.
        let text = "word ".repeat(200);
        let chunks = create_semantic_chunks(&text, 100, 5_000, 0, 100);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn semantic_chunks_honor_max_chunks() {
        let text = "phrase. ".repeat(1000);
        let chunks = create_semantic_chunks(&text, 50, 5, 0, 7);
        assert_eq!(chunks.len(), 7);
    }

    #[test]
    fn sentence_boundary_detection() {
        let text = "Fin. Suite";
        assert!(is_sentence_boundary(text, 3));
        assert!(!is_sentence_boundary(text, 2));
        assert!(is_sentence_boundary("Fin.", 3));
        assert!(!is_sentence_boundary("3.14", 1));
        assert!(!is_sentence_boundary("", 0));
    }

    #[test]
    fn paragraph_boundaries_are_ordered() {
        let text = "a\n\nb\n \nc";
        let boundaries = find_paragraph_boundaries(text);
        assert_eq!(boundaries, vec![1, 4]);
    }

    #[test]
    fn preview_returns_short_text_unchanged() {
        assert_eq!(meaningful_preview("court", 100), "court");
    }

    #[test]
    fn preview_keeps_key_sentences() {
        let filler = "Phrase de remplissage sans grand interet pour le lecteur. ";
        let text = format!(
            "{}Le point essentiel du document est ici. {}",
            filler.repeat(20),
            filler.repeat(20),
        );
        let preview = meaningful_preview(&text, 600);
        assert!(preview.len() <= 600);
        assert!(preview.contains("essentiel"));
        assert!(preview.contains("[...]"));
    }

    #[test]
    fn preview_respects_max_length() {
        let text = "x".repeat(10_000);
        assert!(meaningful_preview(&text, 500).len() <= 500);
    }

    #[test]
    fn char_boundary_helpers_never_split_codepoints() {
        let text = "héhé japonais: 日本語";
        for i in 0..=text.len() {
            assert!(text.is_char_boundary(floor_char_boundary(text, i)));
            assert!(text.is_char_boundary(ceil_char_boundary(text, i)));
        }
    }
}
