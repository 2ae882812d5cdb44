//! Recursive character splitter with overlap.
//!
//! Splits page text into [`Chunk`]s of at most `chunk_size` characters,
//! carrying up to `chunk_overlap` characters of the previous chunk into the
//! next one so that sentences straddling a boundary stay retrievable.
//!
//! # Algorithm
//!
//! 1. If the text fits in `chunk_size` chars it becomes a single piece.
//! 2. Otherwise split on the first separator that occurs in the text, trying
//!    `"\n\n"`, `"\n"`, `". "`, `" "` in that order. Separators stay attached
//!    to the end of the piece they terminate, so concatenating the pieces
//!    gives back the original text.
//! 3. Pieces still longer than `chunk_size` are split again with the
//!    remaining separators, and finally hard-cut on char boundaries.
//! 4. Pieces are merged greedily into windows of at most `chunk_size` chars.
//!    When a window is emitted, pieces are dropped from its front until at
//!    most `chunk_overlap` chars remain; those seed the next window.
//! 5. Emitted windows are trimmed; whitespace-only windows are skipped.
//!
//! Lengths are counted in `char`s, never bytes.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::{split_text, ChunkingParams};
//!
//! let params = ChunkingParams { chunk_size: 5000, chunk_overlap: 500 };
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", &params);
//! assert_eq!(pieces.len(), 1);
//! assert_eq!(pieces[0].text, "Hello world.\n\nSecond paragraph.");
//! ```

use std::collections::{BTreeMap, VecDeque};

use sha2::{Digest, Sha256};

use crate::models::{Chunk, MetadataValue};

/// Separators tried in order before falling back to a hard cut.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Splitter limits, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            chunk_overlap: 500,
        }
    }
}

impl ChunkingParams {
    /// Check that the limits describe a splitter that always makes progress.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        Ok(())
    }
}

/// A split of the input text and its char offset within that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub text: String,
}

/// Split `text` into overlapping spans of at most `chunk_size` chars.
///
/// Returns an empty vector for empty or whitespace-only input.
pub fn split_text(text: &str, params: &ChunkingParams) -> Vec<TextSpan> {
    if text.trim().is_empty() || params.chunk_size == 0 {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    split_recursive(text, 0, SEPARATORS, params.chunk_size, &mut pieces);
    merge_pieces(text, &pieces, params)
}

/// Chunk the pages of one document.
///
/// `pages[i]` is page `i + 1`. Chunk indices run contiguously across the
/// whole document starting at 0.
pub fn chunk_pages(source: &str, pages: &[String], params: &ChunkingParams) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for (page_idx, page) in pages.iter().enumerate() {
        for span in split_text(page, params) {
            let mut metadata = BTreeMap::new();
            metadata.insert("source".to_string(), MetadataValue::from(source));
            metadata.insert("page".to_string(), MetadataValue::from(page_idx + 1));
            metadata.insert("chunk_index".to_string(), MetadataValue::from(chunks.len()));
            metadata.insert("start_offset".to_string(), MetadataValue::from(span.start));
            chunks.push(make_chunk(span.text, metadata));
        }
    }
    chunks
}

/// Create a [`Chunk`] with a SHA-256 content hash.
pub fn make_chunk(text: String, metadata: BTreeMap<String, MetadataValue>) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        text,
        metadata,
        hash,
    }
}

/// Break `text` (starting at byte `base` of the original) into pieces of at
/// most `max_chars` chars. Pieces are `(byte_offset, &str)` and tile the
/// input without gaps.
fn split_recursive<'a>(
    text: &'a str,
    base: usize,
    separators: &[&str],
    max_chars: usize,
    out: &mut Vec<(usize, &'a str)>,
) {
    if text.chars().count() <= max_chars {
        out.push((base, text));
        return;
    }

    let position = separators.iter().position(|sep| text.contains(sep));
    let Some(position) = position else {
        hard_split(text, base, max_chars, out);
        return;
    };
    let sep = separators[position];
    let rest = &separators[position + 1..];

    let mut offset = base;
    for piece in text.split_inclusive(sep) {
        if piece.chars().count() <= max_chars {
            out.push((offset, piece));
        } else {
            split_recursive(piece, offset, rest, max_chars, out);
        }
        offset += piece.len();
    }
}

/// Cut `text` into consecutive runs of `max_chars` chars.
fn hard_split<'a>(text: &'a str, base: usize, max_chars: usize, out: &mut Vec<(usize, &'a str)>) {
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == max_chars {
            out.push((base + start, &text[start..idx]));
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push((base + start, &text[start..]));
    }
}

fn merge_pieces(original: &str, pieces: &[(usize, &str)], params: &ChunkingParams) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut window: VecDeque<(usize, &str, usize)> = VecDeque::new();
    let mut window_len = 0usize;

    for &(offset, piece) in pieces {
        let piece_len = piece.chars().count();

        if window_len + piece_len > params.chunk_size && !window.is_empty() {
            emit(original, &window, &mut spans);
            while window_len > params.chunk_overlap
                || (window_len + piece_len > params.chunk_size && window_len > 0)
            {
                match window.pop_front() {
                    Some((_, _, len)) => window_len -= len,
                    None => break,
                }
            }
        }

        window.push_back((offset, piece, piece_len));
        window_len += piece_len;
    }

    if !window.is_empty() {
        emit(original, &window, &mut spans);
    }

    spans
}

fn emit(original: &str, window: &VecDeque<(usize, &str, usize)>, spans: &mut Vec<TextSpan>) {
    let Some(&(first_offset, _, _)) = window.front() else {
        return;
    };
    let joined: String = window.iter().map(|(_, piece, _)| *piece).collect();
    let trimmed_start = joined.trim_start();
    let text = trimmed_start.trim_end();
    if text.is_empty() {
        return;
    }
    let leading = joined.len() - trimmed_start.len();
    let byte_start = first_offset + leading;
    let start = original[..byte_start].chars().count();

    if spans.last().map(|s: &TextSpan| s.text.as_str()) == Some(text) {
        return;
    }
    spans.push(TextSpan {
        start,
        text: text.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(size: usize, overlap: usize) -> ChunkingParams {
        ChunkingParams {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let spans = split_text("Hello, world!", &params(5000, 500));
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Hello, world!");
        assert_eq!(spans[0].start, 0);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(split_text("", &params(100, 10)).is_empty());
        assert!(split_text("  \n\n \t", &params(100, 10)).is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = (0..200)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let spans = split_text(&text, &params(120, 30));
        assert!(spans.len() > 1);
        for s in &spans {
            assert!(s.text.chars().count() <= 120, "too long: {}", s.text.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = (0..60)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let spans = split_text(&text, &params(50, 20));
        assert!(spans.len() > 2);
        for pair in spans.windows(2) {
            let prev_end = pair[0].start + pair[0].text.chars().count();
            assert!(pair[1].start < prev_end, "no overlap between {:?}", pair);
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn test_zero_overlap_tiles_text() {
        let text = "aaaa bbbb cccc dddd eeee ffff";
        let spans = split_text(text, &params(10, 0));
        let rebuilt = spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(40);
        let para_b = "b".repeat(40);
        let text = format!("{}\n\n{}", para_a, para_b);
        let spans = split_text(&text, &params(60, 0));
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, para_a);
        assert_eq!(spans[1].text, para_b);
        assert_eq!(spans[1].start, 42);
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let text = "x".repeat(25);
        let spans = split_text(&text, &params(10, 0));
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[2].text.len(), 5);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let spans = split_text(text, &params(8, 2));
        assert!(!spans.is_empty());
        for s in &spans {
            assert!(s.text.chars().count() <= 8);
        }
    }

    #[test]
    fn test_offsets_point_into_source() {
        let text = "First paragraph here.\n\nSecond paragraph follows.\n\nThird one ends it.";
        let spans = split_text(text, &params(30, 5));
        let chars: Vec<char> = text.chars().collect();
        for s in &spans {
            let slice: String = chars[s.start..s.start + s.text.chars().count()]
                .iter()
                .collect();
            assert_eq!(slice, s.text);
        }
    }

    #[test]
    fn test_chunk_pages_metadata() {
        let pages = vec![
            "The capital of France is Paris.".to_string(),
            "   ".to_string(),
            "Berlin is the capital of Germany.".to_string(),
        ];
        let chunks = chunk_pages("atlas.pdf", &pages, &params(5000, 500));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source(), Some("atlas.pdf"));
        assert_eq!(chunks[0].page(), Some(1));
        assert_eq!(chunks[1].page(), Some(3));
        assert_eq!(chunks[1].meta("chunk_index"), Some(&MetadataValue::Int(1)));
        assert_eq!(chunks[0].hash.len(), 64);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let a = split_text(text, &params(8, 2));
        let b = split_text(text, &params(8, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate() {
        assert!(params(5000, 500).validate().is_ok());
        assert!(params(0, 0).validate().is_err());
        assert!(params(100, 100).validate().is_err());
    }
}
