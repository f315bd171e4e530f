//! Incremental classification of a streamed model-output text feed.
//!
//! Two small state machines, each returning an `(emitted, held-tail)` pair
//! per call so that chunk boundaries never leak half a tag into a sink:
//!
//! - [`ThinkSplitter`] separates visible prose from `<think>`/`<thinking>`
//!   reasoning regions.
//! - [`CallExtractor`] strips `<mcp_call>`/`<tool_call>` payload blocks out
//!   of either sub-stream.

pub mod extractor;
pub mod splitter;

pub use extractor::{CallExtractor, ExtractOutput};
pub use splitter::{SplitOutput, ThinkSplitter};

/// ASCII-case-insensitive substring search that preserves byte offsets.
/// The tag vocabulary is ASCII, so no lowercased copy of the haystack is
/// needed (which would break offsets for some Unicode text).
pub(crate) fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Split `text` so that at most `tail` characters remain in the second half,
/// respecting char boundaries.
pub(crate) fn split_keep_tail(text: &str, tail: usize) -> (&str, &str) {
    let char_count = text.chars().count();
    if char_count <= tail {
        return ("", text);
    }
    let cut = text
        .char_indices()
        .nth(char_count - tail)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(cut)
}
