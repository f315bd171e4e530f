//! Per-turn mutable state and the narrow sink the orchestrator reports
//! through. The engine owns a `TurnState` exclusively for the duration of a
//! turn; observers only ever see snapshots via [`TranscriptSink`].

use std::collections::HashSet;

use kite_types::MessageTag;

/// Where a tag was emitted, as a char offset into the accumulated visible
/// text. Used by the transcript assembler to anchor inline markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAnchor {
    pub tag_id: String,
    pub visible_offset: usize,
}

/// Accumulated state for one user turn. Discarded after persistence.
#[derive(Debug, Default)]
pub struct TurnState {
    pub visible: String,
    pub thinking: String,
    pub tags: Vec<MessageTag>,
    pub anchors: Vec<TagAnchor>,
    /// Raw candidate blocks collected in the current round.
    pub raw_blocks: Vec<String>,
    /// Signatures of calls already dispatched this turn.
    pub seen_signatures: HashSet<String>,
    pub round: u32,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_output(&self) -> bool {
        !self.visible.trim().is_empty() || !self.thinking.trim().is_empty() || !self.tags.is_empty()
    }

    /// Fold one round's visible/thinking text into the cumulative transcript,
    /// separating from prior content with a blank line when both sides are
    /// non-empty.
    pub fn merge_round_text(&mut self, visible: &str, thinking: &str) {
        let visible = visible.trim();
        let thinking = thinking.trim();
        if !visible.is_empty() {
            if !self.visible.is_empty() {
                self.visible.push_str("\n\n");
            }
            self.visible.push_str(visible);
        }
        if !thinking.is_empty() {
            if !self.thinking.is_empty() {
                self.thinking.push_str("\n\n");
            }
            self.thinking.push_str(thinking);
        }
    }

    /// Record a tag at the current end of visible text.
    pub fn push_tag(&mut self, tag: MessageTag) {
        self.anchors.push(TagAnchor {
            tag_id: tag.id.clone(),
            visible_offset: self.visible.chars().count(),
        });
        self.tags.push(tag);
    }
}

/// Observer for in-flight turn state. Implementations must be cheap; the
/// orchestrator already throttles content updates.
pub trait TranscriptSink: Send + Sync {
    fn on_content_update(&self, visible: &str, thinking: &str);
    fn on_tag_appended(&self, tag: &MessageTag);
    fn on_tag_updated(&self, tag: &MessageTag);
}

/// Sink that ignores everything, for headless callers.
pub struct NullSink;

impl TranscriptSink for NullSink {
    fn on_content_update(&self, _visible: &str, _thinking: &str) {}
    fn on_tag_appended(&self, _tag: &MessageTag) {}
    fn on_tag_updated(&self, _tag: &MessageTag) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_types::TagKind;

    #[test]
    fn merge_separates_with_blank_line() {
        let mut state = TurnState::new();
        state.merge_round_text("first", "t1");
        state.merge_round_text("second", "");
        assert_eq!(state.visible, "first\n\nsecond");
        assert_eq!(state.thinking, "t1");
    }

    #[test]
    fn push_tag_anchors_at_current_offset() {
        let mut state = TurnState::new();
        state.visible = "hello".to_string();
        let tag = MessageTag::running(TagKind::Mcp, "search", "");
        let id = tag.id.clone();
        state.push_tag(tag);
        assert_eq!(
            state.anchors,
            vec![TagAnchor {
                tag_id: id,
                visible_offset: 5
            }]
        );
    }

    #[test]
    fn has_output_counts_tags() {
        let mut state = TurnState::new();
        assert!(!state.has_output());
        state.push_tag(MessageTag::running(TagKind::AppDev, "x", ""));
        assert!(state.has_output());
    }
}
