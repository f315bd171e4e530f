use crate::{find_ascii_ci, split_keep_tail};

/// Longest tag is `</thinking>` (11 bytes); hold one char more so a tag
/// split across chunk boundaries can never be emitted literally.
const SAFETY_TAIL: usize = 12;

const OPEN_TAGS: [&str; 2] = ["<thinking>", "<think>"];
const CLOSE_TAGS: [&str; 2] = ["</thinking>", "</think>"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Visible,
    Thinking,
}

/// Text emitted by one splitter call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    pub visible: String,
    pub thinking: String,
}

impl SplitOutput {
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.thinking.is_empty()
    }

    pub fn merge(&mut self, other: SplitOutput) {
        self.visible.push_str(&other.visible);
        self.thinking.push_str(&other.thinking);
    }
}

/// Incrementally classifies a growing text stream into visible prose and
/// `<think>`/`<thinking>` reasoning, tolerating tags split across chunks.
///
/// Tag matching is case-insensitive and either close spelling terminates
/// either open spelling. Tags themselves are never emitted to a sink.
#[derive(Debug)]
pub struct ThinkSplitter {
    mode: Mode,
    remainder: String,
}

impl Default for ThinkSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThinkSplitter {
    pub fn new() -> Self {
        Self {
            mode: Mode::Visible,
            remainder: String::new(),
        }
    }

    pub fn in_thinking(&self) -> bool {
        self.mode == Mode::Thinking
    }

    /// Feed the next stream fragment. Everything that can be classified with
    /// certainty is returned; an ambiguous tail is retained for the next call.
    pub fn push(&mut self, fragment: &str) -> SplitOutput {
        let mut buf = std::mem::take(&mut self.remainder);
        buf.push_str(fragment);

        let mut out = SplitOutput::default();
        loop {
            let tags: &[&str] = match self.mode {
                Mode::Visible => &OPEN_TAGS,
                Mode::Thinking => &CLOSE_TAGS,
            };
            let hit = tags
                .iter()
                .filter_map(|t| find_ascii_ci(&buf, t).map(|i| (i, t.len())))
                .min_by_key(|&(i, _)| i);

            match hit {
                Some((at, tag_len)) => {
                    self.emit(&mut out, &buf[..at]);
                    buf.drain(..at + tag_len);
                    self.mode = match self.mode {
                        Mode::Visible => Mode::Thinking,
                        Mode::Thinking => Mode::Visible,
                    };
                }
                None => {
                    let (safe, tail) = split_keep_tail(&buf, SAFETY_TAIL);
                    self.emit(&mut out, safe);
                    self.remainder = tail.to_string();
                    return out;
                }
            }
        }
    }

    /// Stream end: flush the held tail into whichever mode is active. An
    /// unterminated thinking region flushes as thinking.
    pub fn finish(&mut self) -> SplitOutput {
        let buf = std::mem::take(&mut self.remainder);
        let mut out = SplitOutput::default();
        self.emit(&mut out, &buf);
        out
    }

    fn emit(&self, out: &mut SplitOutput, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.mode {
            Mode::Visible => out.visible.push_str(text),
            Mode::Thinking => out.thinking.push_str(text),
        }
    }
}

/// Convenience for post-hoc splitting of already-complete text.
pub fn split_complete(text: &str) -> SplitOutput {
    let mut splitter = ThinkSplitter::new();
    let mut out = splitter.push(text);
    out.merge(splitter.finish());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> SplitOutput {
        let mut splitter = ThinkSplitter::new();
        let mut out = SplitOutput::default();
        for f in fragments {
            out.merge(splitter.push(f));
        }
        out.merge(splitter.finish());
        out
    }

    #[test]
    fn plain_text_is_visible() {
        let out = run(&["hello world"]);
        assert_eq!(out.visible, "hello world");
        assert_eq!(out.thinking, "");
    }

    #[test]
    fn balanced_tags_split_cleanly() {
        let out = run(&["before <think>inner</think> after"]);
        assert_eq!(out.visible, "before  after");
        assert_eq!(out.thinking, "inner");
    }

    #[test]
    fn tag_split_across_fragments() {
        // Scenario B from the design notes.
        let out = run(&["<thi", "nk>secret</thin", "k>visible"]);
        assert_eq!(out.thinking, "secret");
        assert_eq!(out.visible, "visible");
    }

    #[test]
    fn mixed_spellings_close_each_other() {
        let out = run(&["a<thinking>b</think>c<think>d</thinking>e"]);
        assert_eq!(out.visible, "ace");
        assert_eq!(out.thinking, "bd");
    }

    #[test]
    fn tags_are_case_insensitive() {
        let out = run(&["x<THINK>y</Think>z"]);
        assert_eq!(out.visible, "xz");
        assert_eq!(out.thinking, "y");
    }

    #[test]
    fn unterminated_thinking_flushes_as_thinking() {
        let out = run(&["lead <think>never closed"]);
        assert_eq!(out.visible, "lead ");
        assert_eq!(out.thinking, "never closed");
    }

    #[test]
    fn chunking_does_not_change_output() {
        let text = "A<think>deep thought</thinking>B<thinking>more</think>C tail";
        let whole = run(&[text]);

        // Every split point, including mid-tag ones.
        for cut in 0..text.len() {
            if !text.is_char_boundary(cut) {
                continue;
            }
            let (a, b) = text.split_at(cut);
            assert_eq!(run(&[a, b]), whole, "split at {cut}");
        }
    }

    #[test]
    fn multibyte_text_near_tail_boundary() {
        let out = run(&["héllo wörld \u{1F600} <think>ünïcode</think>"]);
        assert_eq!(out.visible, "héllo wörld \u{1F600} ");
        assert_eq!(out.thinking, "ünïcode");
    }
}
