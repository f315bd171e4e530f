//! Transcript assembly: inline tag markers and their removal.
//!
//! A persisted message's `content` string is the only place tag anchors are
//! recorded, as literal `<!--mcp_tag:ID-->` tokens at the visible-text
//! offset where the tool call happened. Consumers needing clean prose
//! (clipboard, title/memory prompts) strip or segment them back out.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::turn::TagAnchor;

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--mcp_tag:([^>]+?)-->").unwrap());

pub fn marker_for(tag_id: &str) -> String {
    format!("<!--mcp_tag:{tag_id}-->")
}

/// Insert markers into `visible` at the recorded char offsets, then collapse
/// runs of blank lines left over from extraction.
pub fn insert_markers(visible: &str, anchors: &[TagAnchor]) -> String {
    // Walk the text once; anchors are recorded in emission order, offsets
    // non-decreasing.
    let mut out = String::with_capacity(visible.len() + anchors.len() * 24);
    let mut anchor_iter = anchors.iter().peekable();
    for (index, ch) in visible.chars().enumerate() {
        while anchor_iter
            .peek()
            .is_some_and(|a| a.visible_offset <= index)
        {
            let anchor = anchor_iter.next().unwrap();
            push_marker(&mut out, &anchor.tag_id);
        }
        out.push(ch);
    }
    for anchor in anchor_iter {
        push_marker(&mut out, &anchor.tag_id);
    }
    collapse_blank_lines(&out)
}

fn push_marker(out: &mut String, tag_id: &str) {
    // Markers sit on their own line so tool cards render between paragraphs.
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&marker_for(tag_id));
    out.push('\n');
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line.trim_end());
    }
    out.trim_end().to_string()
}

/// Remove all markers, yielding clean prose.
pub fn strip_markers(content: &str) -> String {
    let stripped = MARKER.replace_all(content, "");
    collapse_blank_lines(&stripped)
}

/// One run of a segmented message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Tag { tag_id: String },
}

/// Split content into interleaved text and tag references, in order.
pub fn segment(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0usize;
    for caps in MARKER.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        let before = content[cursor..whole.start()].trim();
        if !before.is_empty() {
            segments.push(Segment::Text(before.to_string()));
        }
        segments.push(Segment::Tag {
            tag_id: caps.get(1).unwrap().as_str().to_string(),
        });
        cursor = whole.end();
    }
    let rest = content[cursor..].trim();
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(id: &str, offset: usize) -> TagAnchor {
        TagAnchor {
            tag_id: id.to_string(),
            visible_offset: offset,
        }
    }

    #[test]
    fn markers_land_at_offsets() {
        let content = insert_markers("before after", &[anchor("t1", 7)]);
        assert_eq!(content, "before\n<!--mcp_tag:t1-->\nafter");
    }

    #[test]
    fn trailing_anchor_lands_at_end() {
        let content = insert_markers("hello", &[anchor("t1", 5)]);
        assert_eq!(content, "hello\n<!--mcp_tag:t1-->");
    }

    #[test]
    fn strip_recovers_clean_prose() {
        let content = insert_markers("a b", &[anchor("x", 2)]);
        // The marker's own line degrades to a single blank line.
        assert_eq!(strip_markers(&content), "a\n\nb");
        assert!(!strip_markers(&content).contains("mcp_tag"));
    }

    #[test]
    fn segment_interleaves_text_and_tags() {
        let content = insert_markers("intro middle", &[anchor("t1", 6), anchor("t2", 12)]);
        let segments = segment(&content);
        assert_eq!(
            segments,
            vec![
                Segment::Text("intro".to_string()),
                Segment::Tag {
                    tag_id: "t1".to_string()
                },
                Segment::Text("middle".to_string()),
                Segment::Tag {
                    tag_id: "t2".to_string()
                },
            ]
        );
    }

    #[test]
    fn blank_line_runs_collapse() {
        let content = insert_markers("a\n\n\n\nb", &[]);
        assert_eq!(content, "a\n\nb");
    }

    #[test]
    fn multibyte_offsets_are_char_based() {
        let content = insert_markers("héllo wörld", &[anchor("t", 5)]);
        assert!(content.starts_with("héllo"));
        assert!(content.contains("<!--mcp_tag:t-->"));
        assert!(content.ends_with(" wörld"));
    }
}
