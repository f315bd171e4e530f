use once_cell::sync::Lazy;
use regex::Regex;

use crate::split_keep_tail;

/// Complete `<mcp_call>…</mcp_call>` / `<tool_call>…</tool_call>` block.
/// The two tag names are one dialect: a mixed open/close pair is accepted.
static CALL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:mcp_call|tool_call)>(.*?)</(?:mcp_call|tool_call)>").unwrap()
});

/// An opening tag with no close yet — the signal that a payload is still
/// being emitted.
static OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(?:mcp_call|tool_call)>").unwrap());

/// Longest opening tag is 11 bytes; hold back a little more than double so a
/// tag about to begin at a chunk boundary is never emitted as prose.
const SAFETY_TAIL: usize = 24;

/// Output of one extractor call: prose to pass through plus any complete
/// raw payload blocks (inner text, trimmed).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractOutput {
    pub passthrough: String,
    pub blocks: Vec<String>,
}

impl ExtractOutput {
    pub fn merge(&mut self, other: ExtractOutput) {
        self.passthrough.push_str(&other.passthrough);
        self.blocks.extend(other.blocks);
    }
}

/// Strips inline tool-call blocks out of a streamed text feed, holding back
/// an ambiguous tail (a partial or unterminated opening tag) until it can be
/// classified or the stream ends.
#[derive(Debug, Default)]
pub struct CallExtractor {
    buf: String,
}

impl CallExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the held tail contains an opening tag with no close — the
    /// caller must not early-stop stream consumption in that state.
    pub fn has_pending_open_tag(&self) -> bool {
        OPEN_TAG.is_match(&self.buf)
    }

    pub fn push(&mut self, text: &str) -> ExtractOutput {
        self.buf.push_str(text);
        let mut out = ExtractOutput::default();
        self.drain_complete_blocks(&mut out);

        // No further complete block. If an opening tag is pending, hold
        // everything from it; otherwise keep only a small safety suffix.
        match OPEN_TAG.find(&self.buf) {
            Some(m) => {
                let at = m.start();
                out.passthrough.push_str(&self.buf[..at]);
                self.buf.drain(..at);
            }
            None => {
                let (safe, tail) = split_keep_tail(&self.buf, SAFETY_TAIL);
                out.passthrough.push_str(safe);
                self.buf = tail.to_string();
            }
        }
        out
    }

    /// Final flush: remaining complete blocks are extracted, everything else
    /// (including an unterminated opening tag) is emitted as prose.
    pub fn finish(&mut self) -> ExtractOutput {
        let mut out = ExtractOutput::default();
        self.drain_complete_blocks(&mut out);
        out.passthrough.push_str(&self.buf);
        self.buf.clear();
        out
    }

    fn drain_complete_blocks(&mut self, out: &mut ExtractOutput) {
        while let Some(caps) = CALL_BLOCK.captures(&self.buf) {
            let whole = caps.get(0).unwrap();
            let inner = caps.get(1).unwrap().as_str().trim().to_string();
            out.passthrough.push_str(&self.buf[..whole.start()]);
            if !inner.is_empty() {
                out.blocks.push(inner);
            }
            self.buf.drain(..whole.end());
        }
    }
}

/// Post-hoc extraction over already-complete text.
pub fn extract_complete(text: &str) -> ExtractOutput {
    let mut extractor = CallExtractor::new();
    let mut out = extractor.push(text);
    out.merge(extractor.finish());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> ExtractOutput {
        let mut extractor = CallExtractor::new();
        let mut out = ExtractOutput::default();
        for f in fragments {
            out.merge(extractor.push(f));
        }
        out.merge(extractor.finish());
        out
    }

    #[test]
    fn extracts_block_and_passes_prose() {
        // Scenario A text shape.
        let out = run(&[r#"Hello <mcp_call>{"toolName":"search","arguments":{"q":"x"}}</mcp_call> world"#]);
        assert_eq!(out.passthrough, "Hello  world");
        assert_eq!(out.blocks.len(), 1);
        assert!(out.blocks[0].contains("\"toolName\":\"search\""));
    }

    #[test]
    fn tool_call_dialect_and_mixed_close() {
        let out = run(&["a<tool_call>payload</mcp_call>b"]);
        assert_eq!(out.passthrough, "ab");
        assert_eq!(out.blocks, vec!["payload".to_string()]);
    }

    #[test]
    fn block_split_across_fragments() {
        let out = run(&["before <mcp_", "call>{\"toolName\"", ":\"x\"}</mcp_call> after"]);
        assert_eq!(out.passthrough, "before  after");
        assert_eq!(out.blocks, vec!["{\"toolName\":\"x\"}".to_string()]);
    }

    #[test]
    fn pending_open_tag_is_held_until_finish() {
        let mut extractor = CallExtractor::new();
        let out = extractor.push("prose <mcp_call>{\"toolName\":");
        assert_eq!(out.passthrough, "prose ");
        assert!(out.blocks.is_empty());
        assert!(extractor.has_pending_open_tag());

        // Stream ended without a close: the held text is emitted as prose.
        let fin = extractor.finish();
        assert_eq!(fin.passthrough, "<mcp_call>{\"toolName\":");
        assert!(!extractor.has_pending_open_tag());
    }

    #[test]
    fn no_pending_tag_after_complete_block() {
        let mut extractor = CallExtractor::new();
        extractor.push("x<mcp_call>{\"toolName\":\"t\"}</mcp_call>");
        assert!(!extractor.has_pending_open_tag());
    }

    #[test]
    fn multiple_blocks_in_order() {
        let out = run(&["<mcp_call>one</mcp_call>mid<tool_call>two</tool_call>"]);
        assert_eq!(out.blocks, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(out.passthrough, "mid");
    }

    #[test]
    fn chunking_does_not_change_output() {
        let text = "lead <mcp_call>{\"toolName\":\"a\"}</mcp_call> mid <tool_call>{\"toolName\":\"b\"}</tool_call> tail text that is long enough";
        let whole = run(&[text]);
        for cut in 0..text.len() {
            let (a, b) = text.split_at(cut);
            assert_eq!(run(&[a, b]), whole, "split at {cut}");
        }
    }

    #[test]
    fn empty_block_is_dropped() {
        let out = run(&["a<mcp_call>  </mcp_call>b"]);
        assert!(out.blocks.is_empty());
        assert_eq!(out.passthrough, "ab");
    }
}
