//! Document segmentation.
//!
//! Text is split on paragraph and sentence boundaries by `text-splitter`,
//! then normalised into contiguous content ranges so that the segments
//! tile the input exactly. Each segment after the first carries a short
//! prefix copied from the end of its predecessor; `overlap` records its
//! byte length so the original text can be reassembled.

use crate::config::ChunkingConfig;
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};
use unicode_segmentation::UnicodeSegmentation;

/// Characters per token used by the estimator.
pub const CHARS_PER_TOKEN: usize = 4;

/// Page separator in extracted text.
pub const PAGE_BREAK: char = '\u{0C}';

/// One bounded segment of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Overlap prefix followed by the segment's own content
    pub text: String,
    pub sequence_index: u32,
    /// Estimated tokens of `text`, surrounding whitespace excluded
    pub token_count: u32,
    /// Byte length of the overlap prefix at the start of `text`
    pub overlap: usize,
    /// 1-based page of the first non-blank character of the content
    pub page_number: u32,
    pub content_hash: String,
}

impl Segment {
    /// The segment's own content, without the overlap prefix.
    pub fn content(&self) -> &str {
        &self.text[self.overlap..]
    }
}

/// Approximate token count: grapheme clusters divided by four, rounded up.
pub fn estimate_tokens(text: &str) -> u32 {
    text.graphemes(true).count().div_ceil(CHARS_PER_TOKEN) as u32
}

/// Tokens counted against the segment budget. Leading and trailing
/// whitespace is free, so blank runs never push content over the limit.
fn budget_tokens(text: &str) -> u32 {
    estimate_tokens(text.trim())
}

/// Number of pages in extracted text (at least 1).
pub fn page_count(text: &str) -> u32 {
    1 + text.matches(PAGE_BREAK).count() as u32
}

/// Split text into ordered, overlapping segments.
///
/// Blank input yields no segments.
pub fn chunk(text: &str, config: &ChunkingConfig) -> Vec<Segment> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let max_chars = (config.max_tokens * CHARS_PER_TOKEN).max(1);
    let overlap_chars = config.overlap_tokens * CHARS_PER_TOKEN;

    let ranges = merge_small_ranges(text, content_ranges(text, max_chars), config);

    let segments: Vec<Segment> = ranges
        .iter()
        .enumerate()
        .map(|(i, &(start, end))| {
            let overlap_start = if i == 0 {
                start
            } else {
                overlap_start(text, ranges[i - 1].0, start, overlap_chars)
            };

            let content = &text[start..end];
            let segment_text = &text[overlap_start..end];
            let first_visible = start + (content.len() - content.trim_start().len());

            Segment {
                text: segment_text.to_string(),
                sequence_index: i as u32,
                token_count: budget_tokens(segment_text),
                overlap: start - overlap_start,
                page_number: page_count(&text[..first_visible]),
                content_hash: content_hash(content),
            }
        })
        .collect();

    tracing::debug!(
        "Chunked {} bytes into {} segments (max {} tokens, overlap {} tokens)",
        text.len(),
        segments.len(),
        config.max_tokens,
        config.overlap_tokens
    );

    segments
}

/// Concatenate segment contents, dropping overlap prefixes.
pub fn reassemble(segments: &[Segment]) -> String {
    segments.iter().map(Segment::content).collect()
}

/// SHA-256 hex digest of segment content.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Contiguous byte ranges covering the whole text.
fn content_ranges(text: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let splitter = TextSplitter::new(ChunkConfig::new(max_chars).with_trim(false));

    let mut starts: Vec<usize> = splitter
        .chunk_indices(text)
        .map(|(offset, _)| offset)
        .collect();
    starts.sort_unstable();
    starts.dedup();

    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| (start, starts.get(i + 1).copied().unwrap_or(text.len())))
        .filter(|(start, end)| start < end)
        .collect()
}

/// Fold blank ranges and undersized fragments into a neighbour, as long as
/// the merged range stays within the token budget.
fn merge_small_ranges(
    text: &str,
    ranges: Vec<(usize, usize)>,
    config: &ChunkingConfig,
) -> Vec<(usize, usize)> {
    let max_tokens = config.max_tokens as u32;
    let min_tokens = config.min_tokens as u32;
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());

    for (start, end) in ranges {
        let piece = &text[start..end];

        let Some(last) = merged.last_mut() else {
            merged.push((start, end));
            continue;
        };

        let blank = piece.trim().is_empty();
        let previous_blank = text[last.0..last.1].trim().is_empty();
        let small = budget_tokens(piece) < min_tokens;
        let fits = budget_tokens(&text[last.0..end]) <= max_tokens;

        if (blank || previous_blank || small) && fits {
            last.1 = end;
        } else {
            merged.push((start, end));
        }
    }

    // A short tail always joins its predecessor.
    if merged.len() >= 2 {
        let (start, end) = merged[merged.len() - 1];
        if budget_tokens(&text[start..end]) < min_tokens {
            merged.pop();
            if let Some(last) = merged.last_mut() {
                last.1 = end;
            }
        }
    }

    merged
}

/// Start of the overlap prefix for a segment whose content begins at
/// `content_start`. Stays within the previous segment and prefers to begin
/// right after whitespace.
fn overlap_start(text: &str, previous_start: usize, content_start: usize, overlap_chars: usize) -> usize {
    if overlap_chars == 0 {
        return content_start;
    }

    let window = &text[previous_start..content_start];
    let Some((cut, _)) = window.char_indices().rev().take(overlap_chars).last() else {
        return content_start;
    };

    let word_start = window[cut..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| cut + i + c.len_utf8())
        .filter(|&candidate| candidate < window.len());

    previous_start + word_start.unwrap_or(cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_tokens: usize, min_tokens: usize, overlap_tokens: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_tokens,
            min_tokens,
            overlap_tokens,
        }
    }

    fn statute(paragraphs: usize) -> String {
        (1..=paragraphs)
            .map(|n| {
                format!(
                    "Article {n}. The lessee shall return the premises in the condition received, \
                     save for ordinary wear, and shall notify the lessor of any defect within thirty days."
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(chunk("", &ChunkingConfig::default()).is_empty());
        assert!(chunk(" \n\t \u{0C} ", &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_short_text_is_single_segment() {
        let segments = chunk("Article 1. Short.", &ChunkingConfig::default());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].sequence_index, 0);
        assert_eq!(segments[0].overlap, 0);
        assert_eq!(segments[0].text, "Article 1. Short.");
    }

    #[test]
    fn test_sequence_indices_are_contiguous() {
        let text = statute(30);
        let segments = chunk(&text, &config(64, 8, 8));

        assert!(segments.len() > 1);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.sequence_index, i as u32);
        }
    }

    #[test]
    fn test_reassembly_is_lossless() {
        let text = format!("  {}\n\n\n{}  \n", statute(12), statute(7));
        let segments = chunk(&text, &config(48, 10, 12));
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_reassembly_with_multibyte_text() {
        let text = "Art. 5º — Todos são iguais perante a lei, sem distinção de qualquer natureza. ".repeat(40);
        let segments = chunk(&text, &config(32, 4, 6));
        assert!(segments.len() > 1);
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_segments_overlap_with_predecessor() {
        let text = statute(20);
        let segments = chunk(&text, &config(64, 8, 10));

        for pair in segments.windows(2) {
            let prefix = &pair[1].text[..pair[1].overlap];
            assert!(pair[1].overlap > 0);
            assert!(pair[0].text.ends_with(prefix));
        }
    }

    #[test]
    fn test_content_respects_token_budget() {
        let text = statute(40);
        let max_tokens = 64;
        let segments = chunk(&text, &config(max_tokens, 8, 10));

        for segment in &segments[..segments.len() - 1] {
            assert!(estimate_tokens(segment.content()) <= max_tokens as u32);
        }
    }

    #[test]
    fn test_leading_whitespace_does_not_absorb_budget() {
        let text = format!("{}{}", " \n".repeat(300), "word ".repeat(300));
        let max_tokens = 20;
        let segments = chunk(&text, &config(max_tokens, 4, 0));

        assert!(segments.len() > 1);
        assert!(segments[0].content().starts_with(" \n \n"));
        assert!(segments[0].token_count <= max_tokens as u32);
        for segment in &segments[..segments.len() - 1] {
            assert!(
                budget_tokens(segment.content()) <= max_tokens as u32,
                "segment {} holds {} tokens",
                segment.sequence_index,
                budget_tokens(segment.content())
            );
        }
        assert!(segments.iter().all(|s| !s.content().trim().is_empty()));
        assert_eq!(reassemble(&segments), text);
    }

    #[test]
    fn test_small_tail_is_merged() {
        let text = format!("{}\n\nEnd.", statute(6));
        let segments = chunk(&text, &config(64, 20, 0));

        let last = segments.last().unwrap();
        assert!(last.content().ends_with("End."));
        assert!(estimate_tokens(last.content()) >= 20);
    }

    #[test]
    fn test_page_numbers_follow_form_feeds() {
        let text = format!("{}\u{0C}{}\u{0C}{}", statute(4), statute(4), statute(4));
        let segments = chunk(&text, &config(64, 8, 0));

        assert_eq!(segments.first().unwrap().page_number, 1);
        assert_eq!(segments.last().unwrap().page_number, 3);
        assert!(segments
            .windows(2)
            .all(|pair| pair[0].page_number <= pair[1].page_number));
        assert_eq!(page_count(&text), 3);
    }

    #[test]
    fn test_token_estimate_is_monotonic() {
        let text = statute(3);
        let mut previous = 0;
        for end in (0..text.len()).filter(|i| text.is_char_boundary(*i)) {
            let tokens = estimate_tokens(&text[..end]);
            assert!(tokens >= previous);
            previous = tokens;
        }
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_content_hash_ignores_overlap() {
        let text = statute(20);
        let segments = chunk(&text, &config(64, 8, 10));
        for segment in &segments {
            assert_eq!(segment.content_hash, content_hash(segment.content()));
            assert_eq!(segment.content_hash.len(), 64);
        }
    }
}
