//! crates/pdfqa_core/src/chunk.rs
//!
//! Splits extracted document text into an ordered sequence of labeled chunks.
//! Three strategies are available; all are deterministic and produce chunks
//! in scan order, which is also the Q&A generation order.

use crate::domain::Chunk;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

/// The chunking strategy selected via configuration. Defaults to `Semantic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkStrategy {
    /// Heading-based: headings delimit chunks, text between two headings
    /// belongs to the earlier one.
    #[default]
    Semantic,
    /// Accumulate paragraphs until a minimum length is reached.
    Paragraph,
    /// Fixed token windows with overlap.
    Fixed,
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid chunk strategy (expected semantic, paragraph or fixed)")]
pub struct ParseStrategyError(String);

impl FromStr for ChunkStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(ChunkStrategy::Semantic),
            "paragraph" => Ok(ChunkStrategy::Paragraph),
            "fixed" => Ok(ChunkStrategy::Fixed),
            other => Err(ParseStrategyError(other.to_string())),
        }
    }
}

/// Tunables for the chunker. `Default` carries the reference values.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Fixed strategy: tokens per window.
    pub max_tokens: usize,
    /// Fixed strategy: tokens shared between consecutive windows.
    pub overlap: usize,
    /// Paragraph strategy: minimum accumulated length before a chunk is emitted.
    pub min_chunk_chars: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            overlap: 100,
            min_chunk_chars: 200,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The fixed-size window would never advance.
    #[error("chunk overlap ({overlap}) must be smaller than the window size ({max_tokens})")]
    OverlapTooLarge { max_tokens: usize, overlap: usize },
}

/// Splits `text` into labeled chunks using the selected strategy.
///
/// Empty or whitespace-only input yields an empty sequence for every strategy.
pub fn chunk_text(
    text: &str,
    strategy: ChunkStrategy,
    opts: &ChunkOptions,
) -> Result<Vec<Chunk>, ChunkError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match strategy {
        ChunkStrategy::Semantic => Ok(chunk_by_headings(text)),
        ChunkStrategy::Paragraph => Ok(chunk_by_paragraphs(text, opts.min_chunk_chars)),
        ChunkStrategy::Fixed => chunk_by_size(text, opts.max_tokens, opts.overlap),
    }
}

//=========================================================================================
// Heading-based strategy
//=========================================================================================

/// Heading-like lines: markdown heading markers, `Chapter N` / `Section N`
/// markers, and short all-caps lines. Alternation order resolves overlapping
/// styles to whichever pattern matches earliest in the text.
fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:#+[ \t]+\S.*|(?:CHAPTER|Chapter|SECTION|Section)[ \t]+\d+\b.*|[A-Z][A-Z0-9 \t]{3,58})[ \t]*$",
        )
        .expect("heading pattern is valid")
    })
}

/// Strips markdown markers and surrounding whitespace from a matched heading line.
fn clean_heading(raw: &str) -> String {
    raw.trim().trim_start_matches('#').trim().to_string()
}

fn chunk_by_headings(text: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current_heading = "Introduction".to_string();
    let mut last_end = 0;

    for m in heading_pattern().find_iter(text) {
        let body = text[last_end..m.start()].trim();
        if !body.is_empty() {
            chunks.push(Chunk {
                heading: current_heading.clone(),
                content: body.to_string(),
            });
        }
        current_heading = clean_heading(m.as_str());
        last_end = m.end();
    }

    let tail = text[last_end..].trim();
    if !tail.is_empty() {
        chunks.push(Chunk {
            heading: current_heading,
            content: tail.to_string(),
        });
    }
    chunks
}

//=========================================================================================
// Paragraph strategy
//=========================================================================================

/// A short paragraph ending in `:` or `.` is read as a heading for the
/// paragraphs that follow rather than as content.
fn looks_like_paragraph_heading(para: &str) -> bool {
    para.len() < 100 && (para.ends_with(':') || para.ends_with('.'))
}

fn blank_line_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"))
}

fn chunk_by_paragraphs(text: &str, min_chunk_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current_heading = "Text".to_string();
    let mut current = String::new();

    let mut emit = |heading: &str, content: &mut String| {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                heading: heading.to_string(),
                content: trimmed.to_string(),
            });
        }
        content.clear();
    };

    for para in blank_line_pattern().split(text) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if looks_like_paragraph_heading(para) {
            // Flush whatever accumulated under the previous heading first.
            emit(&current_heading, &mut current);
            current_heading = para.to_string();
            continue;
        }

        current.push_str(para);
        current.push_str("\n\n");

        if current.trim().len() >= min_chunk_chars {
            emit(&current_heading, &mut current);
        }
    }

    emit(&current_heading, &mut current);
    chunks
}

//=========================================================================================
// Fixed-size strategy
//=========================================================================================

/// A short, colon/period-terminated line usable as a window title.
fn looks_like_window_title(line: &str) -> bool {
    line.len() > 10 && line.len() < 100 && (line.ends_with(':') || line.ends_with('.'))
}

fn chunk_by_size(text: &str, max_tokens: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    if overlap >= max_tokens {
        return Err(ChunkError::OverlapTooLarge {
            max_tokens,
            overlap,
        });
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let step = max_tokens - overlap;
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < tokens.len() {
        let end = (start + max_tokens).min(tokens.len());
        let content = tokens[start..end].join(" ");

        let heading = content
            .lines()
            .take(5)
            .map(str::trim)
            .find(|line| looks_like_window_title(line))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Chunk {}", chunks.len() + 1));

        chunks.push(Chunk { heading, content });
        start += step;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULTS: ChunkOptions = ChunkOptions {
        max_tokens: 1000,
        overlap: 100,
        min_chunk_chars: 200,
    };

    #[test]
    fn empty_input_yields_no_chunks_for_any_strategy() {
        for strategy in [
            ChunkStrategy::Semantic,
            ChunkStrategy::Paragraph,
            ChunkStrategy::Fixed,
        ] {
            assert!(chunk_text("", strategy, &DEFAULTS).unwrap().is_empty());
            assert!(chunk_text("  \n\n ", strategy, &DEFAULTS).unwrap().is_empty());
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "# One\nalpha beta gamma\n\n# Two\ndelta epsilon";
        for strategy in [
            ChunkStrategy::Semantic,
            ChunkStrategy::Paragraph,
            ChunkStrategy::Fixed,
        ] {
            let first = chunk_text(text, strategy, &DEFAULTS).unwrap();
            let second = chunk_text(text, strategy, &DEFAULTS).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn markdown_headings_delimit_semantic_chunks() {
        let text = "# Introduction\n\
                    This system ingests PDF documents.\n\n\
                    It produces question-answer pairs for each section.\n\n\
                    # Details\n\
                    Chunking happens in a single left-to-right pass.";
        let chunks = chunk_text(text, ChunkStrategy::Semantic, &DEFAULTS).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading, "Introduction");
        assert!(chunks[0].content.contains("ingests PDF documents"));
        assert_eq!(chunks[1].heading, "Details");
        assert!(chunks[1].content.contains("left-to-right pass"));
    }

    #[test]
    fn text_before_the_first_heading_is_labeled_introduction() {
        let text = "Some preamble before any heading.\n\n# Setup\nInstall the tool.";
        let chunks = chunk_text(text, ChunkStrategy::Semantic, &DEFAULTS).unwrap();
        assert_eq!(chunks[0].heading, "Introduction");
        assert_eq!(chunks[0].content, "Some preamble before any heading.");
        assert_eq!(chunks[1].heading, "Setup");
    }

    #[test]
    fn chapter_markers_and_all_caps_lines_are_headings() {
        let text = "Chapter 1: Beginnings\nIt was a dark and stormy night.\n\
                    METHODOLOGY\nWe measured twice and cut once.";
        let chunks = chunk_text(text, ChunkStrategy::Semantic, &DEFAULTS).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading, "Chapter 1: Beginnings");
        assert_eq!(chunks[1].heading, "METHODOLOGY");
    }

    #[test]
    fn paragraph_strategy_accumulates_until_min_length() {
        let long_a = "alpha ".repeat(40); // ~240 chars, emitted on its own
        let text = format!("{long_a}\n\nshort tail paragraph without terminator");
        let chunks = chunk_text(&text, ChunkStrategy::Paragraph, &DEFAULTS).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading, "Text");
        assert!(chunks[1].content.contains("short tail"));
    }

    #[test]
    fn short_terminated_paragraph_becomes_the_next_heading() {
        let body = "word ".repeat(50);
        let text = format!("Key Concepts:\n\n{body}");
        let chunks = chunk_text(&text, ChunkStrategy::Paragraph, &DEFAULTS).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "Key Concepts:");
        assert!(!chunks[0].content.contains("Key Concepts"));
    }

    #[test]
    fn fixed_strategy_produces_ceil_tokens_over_step_chunks() {
        // 2_500 tokens, window 1000, overlap 100 -> step 900 -> ceil(2500/900) = 3
        let text = (0..2_500).map(|i| format!("t{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, ChunkStrategy::Fixed, &DEFAULTS).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.split_whitespace().count(), 1000);
        assert_eq!(chunks[1].content.split_whitespace().count(), 1000);
        // Final window holds the remainder: 2500 - 1800 = 700 tokens.
        assert_eq!(chunks[2].content.split_whitespace().count(), 700);
    }

    #[test]
    fn consecutive_fixed_chunks_share_exactly_the_overlap() {
        let text = (0..2_000).map(|i| format!("t{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_text(&text, ChunkStrategy::Fixed, &DEFAULTS).unwrap();
        let first: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let second: Vec<&str> = chunks[1].content.split_whitespace().collect();
        assert_eq!(&first[900..], &second[..100]);
    }

    #[test]
    fn fixed_chunks_without_a_title_line_fall_back_to_an_index_label() {
        let text = "lorem ipsum dolor sit amet ".repeat(100);
        let chunks = chunk_text(&text, ChunkStrategy::Fixed, &DEFAULTS).unwrap();
        assert_eq!(chunks[0].heading, "Chunk 1");
    }

    #[test]
    fn overlap_at_least_window_size_is_rejected() {
        let opts = ChunkOptions {
            max_tokens: 100,
            overlap: 100,
            min_chunk_chars: 200,
        };
        let err = chunk_text("some text here", ChunkStrategy::Fixed, &opts).unwrap_err();
        assert!(matches!(err, ChunkError::OverlapTooLarge { .. }));
    }
}
