//! Break-point selection for the text chunker.
//!
//! Given a window `[0, max_offset)` into the remaining document, pick the
//! offset to cut at so the chunk ends at a structurally sound point
//! whenever one exists in range. Offsets are byte offsets clamped to UTF-8
//! character boundaries; since a character is at least one byte, a
//! byte-bounded window can never exceed the remote service's character
//! limit.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence-ending punctuation, optionally followed by a closing quote,
/// followed by whitespace or end of window. The match end includes the
/// trailing whitespace run so the cut lands after it.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]["'”’]?(\s+|$)"#).unwrap());

/// Break-point selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum BoundaryPolicy {
    /// Sentence terminators only: first terminator at or after
    /// `min_offset`, else the last one in the window, else the last space,
    /// else the window end.
    #[serde(rename = "sentence")]
    SentenceFirst,
    /// Paragraph breaks, then line breaks, then sentence terminators, then
    /// the sentence/space fallbacks. Used for long-form chunking.
    #[default]
    #[serde(rename = "natural")]
    Natural,
}

impl BoundaryPolicy {
    /// Parse from a CLI/config string.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "sentence" | "sentence-first" => Ok(Self::SentenceFirst),
            "natural" => Ok(Self::Natural),
            _ => Err(format!("Invalid boundary policy: {s}. Use sentence or natural")),
        }
    }
}

/// Largest char-boundary offset `<= idx`.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char-boundary offset `>= idx` (and > 0 for non-empty input).
fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Find the best cut offset in `text[..max_offset]`.
///
/// Returns an offset in `(0, max_offset]` (clamped to a char boundary).
/// The caller guarantees `0 < min_offset < max_offset <= text.len()` and a
/// non-empty window.
pub fn find_boundary(
    text: &str,
    min_offset: usize,
    max_offset: usize,
    policy: BoundaryPolicy,
) -> usize {
    debug_assert!(min_offset < max_offset && max_offset <= text.len());

    let mut window_end = floor_char_boundary(text, max_offset);
    if window_end == 0 {
        // Degenerate window (max_offset inside the first multi-byte char):
        // cut after that char so the chunker always advances.
        return ceil_char_boundary(text, 1);
    }
    let window = &text[..window_end];
    let min_offset = floor_char_boundary(window, min_offset.min(window_end));

    match policy {
        BoundaryPolicy::SentenceFirst => sentence_first(window, min_offset),
        BoundaryPolicy::Natural => natural(window, min_offset),
    }
}

/// Sentence-first ladder: first terminator ending at or after `min_offset`,
/// last terminator anywhere, last space, window end.
fn sentence_first(window: &str, min_offset: usize) -> usize {
    let mut last_end = None;
    for m in SENTENCE_END.find_iter(window) {
        if m.end() >= min_offset {
            return m.end();
        }
        last_end = Some(m.end());
    }
    if let Some(end) = last_end {
        return end;
    }
    last_space_or_end(window)
}

/// Natural ladder: paragraph break, line break, sentence terminator
/// starting at or after `min_offset`, then the sentence/space fallbacks.
fn natural(window: &str, min_offset: usize) -> usize {
    // 1. Paragraph break (two consecutive newlines) at or after min_offset;
    //    the cut lands just past the break.
    if let Some(rel) = window[min_offset..].find("\n\n") {
        return min_offset + rel + 2;
    }

    // 2. Single line break at or after min_offset.
    if let Some(rel) = window[min_offset..].find('\n') {
        return min_offset + rel + 1;
    }

    // 3. Sentence terminator starting at or after min_offset, else the
    //    last terminator anywhere in the window.
    let mut last_end = None;
    for m in SENTENCE_END.find_iter(window) {
        if m.start() >= min_offset {
            return m.end();
        }
        last_end = Some(m.end());
    }
    if let Some(end) = last_end {
        return end;
    }

    // 4. Last space, else cut at the window end verbatim.
    last_space_or_end(window)
}

fn last_space_or_end(window: &str) -> usize {
    match window.rfind(' ') {
        Some(idx) if idx > 0 => idx + 1,
        _ => window.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_first_prefers_first_match_after_min() {
        // Terminators at 12 ("First one. ") and 24; min 15 should pick the
        // second, not the earlier one.
        let text = "First one. And second. Then a trailing tail without end";
        let cut = find_boundary(text, 15, text.len(), BoundaryPolicy::SentenceFirst);
        assert_eq!(&text[..cut], "First one. And second. ");
    }

    #[test]
    fn test_sentence_first_falls_back_to_last_match_before_min() {
        let text = "Short. No more terminators here at all just words";
        let cut = find_boundary(text, 40, text.len(), BoundaryPolicy::SentenceFirst);
        assert_eq!(&text[..cut], "Short. ");
    }

    #[test]
    fn test_sentence_terminator_with_closing_quote() {
        let text = "\"Stop right there!\" she said. And then more words follow here";
        let cut = find_boundary(text, 5, 40, BoundaryPolicy::SentenceFirst);
        assert_eq!(&text[..cut], "\"Stop right there!\" ");
    }

    #[test]
    fn test_no_terminator_falls_back_to_last_space() {
        let text = "word another word and more words without any punctuation";
        let cut = find_boundary(text, 10, 30, BoundaryPolicy::SentenceFirst);
        // Last space in the 30-byte window sits after "more".
        assert_eq!(&text[..cut], "word another word and more ");
    }

    #[test]
    fn test_no_space_cuts_at_max_offset() {
        let text = "x".repeat(2000);
        let cut = find_boundary(&text, 500, 1900, BoundaryPolicy::SentenceFirst);
        assert_eq!(cut, 1900);
        let cut = find_boundary(&text, 500, 1900, BoundaryPolicy::Natural);
        assert_eq!(cut, 1900);
    }

    #[test]
    fn test_natural_prefers_paragraph_break() {
        let text = "First paragraph. More text.\n\nSecond paragraph here. And a sentence.";
        let cut = find_boundary(text, 5, text.len(), BoundaryPolicy::Natural);
        assert_eq!(&text[..cut], "First paragraph. More text.\n\n");
    }

    #[test]
    fn test_natural_prefers_line_break_over_sentence() {
        let text = "A full sentence. Still going\nnext line continues with words.";
        let cut = find_boundary(text, 5, text.len() - 1, BoundaryPolicy::Natural);
        assert_eq!(&text[..cut], "A full sentence. Still going\n");
    }

    #[test]
    fn test_natural_sentence_break_when_no_newlines() {
        let text = "One sentence here. Another one follows. Then trailing words";
        let cut = find_boundary(text, 5, text.len(), BoundaryPolicy::Natural);
        // First terminator starting at or after min_offset = 5.
        assert_eq!(&text[..cut], "One sentence here. ");
    }

    #[test]
    fn test_natural_ignores_paragraph_break_before_min() {
        let text = "Top.\n\nBody text continues for a while. Tail end without stop";
        let cut = find_boundary(text, 10, text.len(), BoundaryPolicy::Natural);
        assert_eq!(&text[..cut], "Top.\n\nBody text continues for a while. ");
    }

    #[test]
    fn test_multibyte_window_clamps_to_char_boundary() {
        // "é" is two bytes; a max_offset inside it must not split the char.
        let text = "caf\u{e9} au lait et encore du texte sans fin ici pour remplir";
        let cut = find_boundary(text, 2, 4, BoundaryPolicy::SentenceFirst);
        assert!(text.is_char_boundary(cut));
        assert!(cut > 0);
    }
}
