use serde::Serialize;

use super::markers::{classify_line, normalize_markers, LineKind};

/// A typed block of assistant output, in source order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    /// A single tool-call hint line, trimmed.
    ToolCall(String),
    Thinking(Vec<String>),
    Response(Vec<String>),
}

impl Segment {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Segment::ToolCall(_) => "tool_call",
            Segment::Thinking(_) => "thinking",
            Segment::Response(_) => "response",
        }
    }
}

/// Output of one full parse pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SegmentPlan {
    pub segments: Vec<Segment>,
    /// Index of the segment the divider rule is rendered before. Equal to
    /// `segments.len()` when the rule trails every segment.
    pub divider_at: Option<usize>,
}

impl SegmentPlan {
    pub fn has_divider(&self) -> bool {
        self.divider_at.is_some()
    }
}

/// Transient parser state. Rebuilt from scratch on every call to
/// [`build_segments`]; nothing is carried between ticks.
#[derive(Default)]
struct ParserState {
    in_thinking: bool,
    after_divider: bool,
    pending_thinking: Vec<String>,
    response: Vec<String>,
    plan: SegmentPlan,
}

impl ParserState {
    fn flush_thinking(&mut self) {
        let lines = std::mem::take(&mut self.pending_thinking);
        if let Some(lines) = trim_blank_edges(lines) {
            self.plan.segments.push(Segment::Thinking(lines));
        }
        self.in_thinking = false;
    }

    fn flush_response(&mut self) {
        let lines = std::mem::take(&mut self.response);
        if let Some(lines) = trim_blank_edges(lines) {
            self.plan.segments.push(Segment::Response(lines));
        }
    }

    fn open_response_region(&mut self) {
        if !self.after_divider {
            self.plan.divider_at = Some(self.plan.segments.len());
            self.after_divider = true;
        }
    }

    fn push(&mut self, kind: LineKind, line: &str, content_follows: bool) {
        match kind {
            LineKind::ToolCall => {
                self.flush_response();
                self.flush_thinking();
                self.plan
                    .segments
                    .push(Segment::ToolCall(line.trim().to_string()));
            }
            LineKind::ThinkingStart | LineKind::ThinkingContinuation => {
                self.flush_response();
                self.flush_thinking();
                self.in_thinking = true;
            }
            LineKind::Divider => {
                self.flush_thinking();
                if content_follows {
                    self.open_response_region();
                }
            }
            LineKind::ResponseStart => {
                self.flush_thinking();
                self.open_response_region();
            }
            LineKind::Plain => {
                if self.in_thinking {
                    self.pending_thinking.push(line.to_string());
                } else if self.after_divider {
                    self.response.push(line.to_string());
                } else if !line.trim().is_empty() {
                    // Text before any marker is implicit thinking content.
                    self.pending_thinking.push(line.to_string());
                }
            }
        }
    }

    fn finish(mut self) -> SegmentPlan {
        self.flush_thinking();
        self.flush_response();
        self.plan
    }
}

fn trim_blank_edges(mut lines: Vec<String>) -> Option<Vec<String>> {
    let first = lines.iter().position(|l| !l.trim().is_empty())?;
    let last = lines.iter().rposition(|l| !l.trim().is_empty())?;
    lines.truncate(last + 1);
    lines.drain(..first);
    Some(lines)
}

/// Split cumulative assistant text into thinking, tool-call and response
/// segments.
///
/// Never fails: partial and malformed marker sequences degrade to plain
/// content, and an unterminated thinking block is emitted as-is so it can be
/// rendered while the stream is still arriving.
pub fn build_segments(text: &str) -> SegmentPlan {
    let normalized = normalize_markers(text);
    let lines: Vec<&str> = normalized.lines().collect();
    let last_content = lines.iter().rposition(|l| !l.trim().is_empty());

    let mut state = ParserState::default();
    for (index, line) in lines.iter().enumerate() {
        let content_follows = last_content.is_some_and(|last| last > index);
        state.push(classify_line(line), line, content_follows);
    }
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn thinking_then_response_with_single_divider() {
        let plan = build_segments("## 思考过程：\nA\nB\n---\n## 回复：\nC");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Thinking(lines(&["A", "B"])),
                Segment::Response(lines(&["C"])),
            ]
        );
        assert_eq!(plan.divider_at, Some(1));
    }

    #[test]
    fn repeated_thinking_headers_produce_independent_blocks() {
        let plan = build_segments("## 思考过程：\nA\n## 思考过程：\nB");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Thinking(lines(&["A"])),
                Segment::Thinking(lines(&["B"])),
            ]
        );
        assert!(!plan.has_divider());
    }

    #[test]
    fn text_before_any_marker_is_implicit_thinking() {
        let plan = build_segments("✅ did X\nhello");
        assert_eq!(
            plan.segments,
            vec![
                Segment::ToolCall("✅ did X".into()),
                Segment::Thinking(lines(&["hello"])),
            ]
        );
    }

    #[test]
    fn tool_call_closes_open_thinking_block() {
        let plan = build_segments("## 思考过程：\nlook it up\n🔍 searched `docs`\n## 思考过程（续）：\nfound it");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Thinking(lines(&["look it up"])),
                Segment::ToolCall("🔍 searched `docs`".into()),
                Segment::Thinking(lines(&["found it"])),
            ]
        );
    }

    #[test]
    fn divider_without_following_content_adds_no_rule() {
        let plan = build_segments("## 思考过程：\nA\n---\n\n  ");
        assert_eq!(plan.segments, vec![Segment::Thinking(lines(&["A"]))]);
        assert_eq!(plan.divider_at, None);
    }

    #[test]
    fn divider_flushes_implicit_thinking() {
        let plan = build_segments("warming up\n---\nanswer");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Thinking(lines(&["warming up"])),
                Segment::Response(lines(&["answer"])),
            ]
        );
        assert_eq!(plan.divider_at, Some(1));
    }

    #[test]
    fn response_header_alone_inserts_rule_once() {
        let plan = build_segments("## 思考过程：\nA\n## 回复：\nB\n---\nC");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Thinking(lines(&["A"])),
                Segment::Response(lines(&["B", "C"])),
            ]
        );
        assert_eq!(plan.divider_at, Some(1));
    }

    #[test]
    fn response_keeps_inner_blank_lines_and_trims_edges() {
        let plan = build_segments("---\n\npara one\n\npara two\n\n");
        assert_eq!(
            plan.segments,
            vec![Segment::Response(lines(&["para one", "", "para two"]))]
        );
        assert_eq!(plan.divider_at, Some(0));
    }

    #[test]
    fn unterminated_thinking_block_is_emitted() {
        let plan = build_segments("## 思考过程：\nstill going");
        assert_eq!(
            plan.segments,
            vec![Segment::Thinking(lines(&["still going"]))]
        );
    }

    #[test]
    fn tool_call_after_response_keeps_source_order() {
        let plan = build_segments("---\nfirst\n📝 saved notes\nsecond");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Response(lines(&["first"])),
                Segment::ToolCall("📝 saved notes".into()),
                Segment::Response(lines(&["second"])),
            ]
        );
        assert_eq!(plan.divider_at, Some(0));
    }

    #[test]
    fn glued_markers_are_split_before_classification() {
        let plan = build_segments("## 思考过程：A\n---## 回复：C");
        assert_eq!(
            plan.segments,
            vec![
                Segment::Thinking(lines(&["A"])),
                Segment::Response(lines(&["C"])),
            ]
        );
        assert_eq!(plan.divider_at, Some(1));
    }

    #[test]
    fn code_comment_with_response_label_stays_in_the_block() {
        let plan = build_segments("## 回复：\n```python\nr = get()  # Response: json body\n```");
        assert_eq!(
            plan.segments,
            vec![Segment::Response(lines(&[
                "```python",
                "r = get()  # Response: json body",
                "```",
            ]))]
        );
    }

    #[test]
    fn single_hash_response_line_is_plain_thinking() {
        let plan = build_segments("## 思考过程：\nplan\n# Response: is cached\nmore");
        assert_eq!(
            plan.segments,
            vec![Segment::Thinking(lines(&["plan", "# Response: is cached", "more"]))]
        );
        assert_eq!(plan.divider_at, None);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert_eq!(build_segments(""), SegmentPlan::default());
        assert_eq!(build_segments("\n \n"), SegmentPlan::default());
    }

    #[test]
    fn every_prefix_parses_without_panicking() {
        let text = "## 思考过程：\n读取 `a.json`\n📖 read a.json\n## 思考过程（续）：\nok\n---\n## 回复：\n**done**";
        for (idx, _) in text.char_indices() {
            let _ = build_segments(&text[..idx]);
        }
    }
}
