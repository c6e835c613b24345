//! Splitting a document into synthesis-sized chunks.
//!
//! The chunker walks the document with a cursor, asking the boundary finder
//! for a cut inside `[min_chunk_size, max_chunk_size]` of the cursor until
//! the remainder fits in one request. Recorded offsets are the pre-trim
//! absolute positions of each raw slice, so consecutive chunks tile
//! `[0, document.len())` with no gaps and no overlaps.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::boundary::{BoundaryPolicy, find_boundary};
use crate::errors::{PipelineError, PipelineResult};

/// Maximum characters of a chunk shown in previews and splice reports.
const PREVIEW_LEN: usize = 50;

/// A bounded-length contiguous slice of the source document, submitted as
/// one synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Whitespace-trimmed text to synthesize. Never empty.
    pub text: String,
    /// Absolute byte offset of the raw (pre-trim) slice start.
    pub start_char: usize,
    /// Absolute byte offset one past the raw slice end.
    pub end_char: usize,
}

impl TextChunk {
    /// Short preview of the chunk text for logs and splice reports.
    pub fn preview(&self) -> String {
        if self.text.chars().count() <= PREVIEW_LEN {
            self.text.clone()
        } else {
            let head: String = self.text.chars().take(PREVIEW_LEN).collect();
            format!("{head}...")
        }
    }
}

/// Split `document` into ordered chunks of at most `max_chunk_size` raw
/// bytes each, cutting at the best boundary the policy can find.
///
/// Guarantees: at least one chunk for any document with synthesizable
/// content; no chunk's trimmed text is empty; chunks are in ascending,
/// contiguous order. A document that trims to nothing is a
/// [`PipelineError::Chunking`].
pub fn chunk_document(
    document: &str,
    min_chunk_size: usize,
    max_chunk_size: usize,
    policy: BoundaryPolicy,
) -> PipelineResult<Vec<TextChunk>> {
    if document.trim().is_empty() {
        return Err(PipelineError::Chunking(
            "document contains no synthesizable text".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut cursor = 0usize;

    while cursor < document.len() {
        let remaining = &document[cursor..];

        // The tail fits in one request: take it all and stop.
        if remaining.len() <= max_chunk_size {
            let trimmed = remaining.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start_char: cursor,
                    end_char: document.len(),
                });
            }
            break;
        }

        let cut = find_boundary(remaining, min_chunk_size, max_chunk_size, policy);
        debug!(
            chunk = chunks.len(),
            cursor,
            cut,
            "selected chunk boundary"
        );

        let trimmed = remaining[..cut].trim();
        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                text: trimmed.to_string(),
                start_char: cursor,
                end_char: cursor + cut,
            });
        }
        // Advance by the raw cut length even when the slice trimmed away.
        cursor += cut;
    }

    if chunks.is_empty() {
        return Err(PipelineError::Chunking(
            "document contains no synthesizable text".to_string(),
        ));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: usize = 500;
    const MAX: usize = 1900;

    fn sentences(n: usize) -> String {
        (0..n)
            .map(|i| format!("This is sentence number {i} with a little padding. "))
            .collect()
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_document("Hello world.", MIN, MAX, BoundaryPolicy::SentenceFirst)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world.");
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 12);
    }

    #[test]
    fn test_empty_document_is_rejected() {
        assert!(chunk_document("", MIN, MAX, BoundaryPolicy::Natural).is_err());
        assert!(chunk_document("   \n\n  ", MIN, MAX, BoundaryPolicy::Natural).is_err());
    }

    #[test]
    fn test_chunks_tile_the_document() {
        let doc = sentences(200);
        let chunks = chunk_document(&doc, MIN, MAX, BoundaryPolicy::SentenceFirst).unwrap();
        assert!(chunks.len() > 1);

        // Contiguous, ascending, covering [0, len).
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks.last().unwrap().end_char, doc.len());
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_char, pair[1].start_char);
        }
    }

    #[test]
    fn test_chunk_bounds_and_nonempty() {
        for policy in [BoundaryPolicy::SentenceFirst, BoundaryPolicy::Natural] {
            let doc = sentences(200);
            let chunks = chunk_document(&doc, MIN, MAX, policy).unwrap();
            for chunk in &chunks {
                assert!(chunk.end_char - chunk.start_char <= MAX);
                assert!(!chunk.text.is_empty());
                // Trimming shrinks but never shifts: the trimmed text is a
                // substring of the raw slice.
                assert!(doc[chunk.start_char..chunk.end_char].contains(&chunk.text));
            }
        }
    }

    #[test]
    fn test_chunks_end_at_sentence_boundaries() {
        let doc = sentences(200);
        let chunks = chunk_document(&doc, MIN, MAX, BoundaryPolicy::SentenceFirst).unwrap();
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.text.ends_with('.'),
                "chunk should end at a sentence: {:?}",
                chunk.preview()
            );
        }
    }

    #[test]
    fn test_no_boundary_falls_back_to_max_size() {
        // 2000 chars, no punctuation, no spaces: every cut lands exactly at
        // the maximum chunk size.
        let doc = "a".repeat(2000);
        let chunks = chunk_document(&doc, MIN, MAX, BoundaryPolicy::Natural).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].end_char, MAX);
        assert_eq!(chunks[0].text.len(), MAX);
        assert_eq!(chunks[1].start_char, MAX);
        assert_eq!(chunks[1].end_char, 2000);
    }

    #[test]
    fn test_natural_policy_splits_on_paragraphs() {
        let para = format!("{}\n\n", sentences(12).trim_end());
        let doc = para.repeat(6);
        let chunks = chunk_document(&doc, MIN, MAX, BoundaryPolicy::Natural).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            // Raw slices end just past a paragraph break.
            assert!(doc[..chunk.end_char].ends_with("\n\n"));
        }
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let chunk = TextChunk {
            text: "x".repeat(120),
            start_char: 0,
            end_char: 120,
        };
        let preview = chunk.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 53);

        let short = TextChunk {
            text: "short".to_string(),
            start_char: 0,
            end_char: 5,
        };
        assert_eq!(short.preview(), "short");
    }
}
