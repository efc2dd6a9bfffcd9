//! Marker detection for streamed assistant output.
//!
//! Models annotate their output with headings such as `## 思考过程：` or
//! `## 回复：`, horizontal rules, and emoji-prefixed tool-call hints. This
//! module normalizes glued markers onto their own lines and classifies single
//! lines; the segment builder consumes the result.

use regex::Regex;
use std::sync::LazyLock;

/// Glyphs that open a tool-call hint line.
pub const TOOL_CALL_GLYPHS: &[&str] = &["📖", "✅", "✏️", "🔧", "🔍", "📁", "📝", "⚠️"];

const THINKING_LABEL: &str = r"(?:思考过程|Thinking Process)";
const CONTINUED_QUALIFIER: &str = r"[ \t]*[（(][ \t]*(?:续|continued)[ \t]*[）)]?";
const RESPONSE_LABEL: &str = r"(?:回[复覆]|Response|Final Answer)";
const COLON: &str = r"[ \t]*[：:]";

fn thinking_marker() -> String {
    format!(r"#{{1,2}}[ \t]*{THINKING_LABEL}(?:{CONTINUED_QUALIFIER})?{COLON}")
}

fn response_marker() -> String {
    format!(r"##[ \t]*{RESPONSE_LABEL}{COLON}")
}

fn any_marker() -> String {
    format!("(?:{}|{})", thinking_marker(), response_marker())
}

/// Markers that are split out of the middle of a line. English labels are
/// only recognized at line start.
fn glued_marker() -> String {
    format!(
        r"(?:#{{1,2}}[ \t]*思考过程(?:{CONTINUED_QUALIFIER})?{COLON}|##[ \t]*回[复覆]{COLON})"
    )
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("marker pattern is a valid regex")
}

static THINKING_START: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"^#{{1,2}}[ \t]*{THINKING_LABEL}{COLON}")));
static THINKING_CONTINUATION: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"^#{{1,2}}[ \t]*{THINKING_LABEL}{CONTINUED_QUALIFIER}{COLON}"
    ))
});
static RESPONSE_START: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!("^{}", response_marker())));
static DIVIDER: LazyLock<Regex> = LazyLock::new(|| compile(r"^-{3,}$"));

static DIVIDER_BEFORE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"-{{3,}}[ \t]*({})", glued_marker())));
static TEXT_BEFORE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"([^#\s])[ \t]*({})", glued_marker())));
static TEXT_AFTER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"(?m)^([ \t]*{})[ \t]*(\S)", any_marker())));

/// Kind of a single classified line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    ToolCall,
    ThinkingStart,
    /// `## 思考过程（续）：`; handled exactly like [`LineKind::ThinkingStart`].
    ThinkingContinuation,
    Divider,
    ResponseStart,
    Plain,
}

impl LineKind {
    pub fn opens_thinking(self) -> bool {
        matches!(self, LineKind::ThinkingStart | LineKind::ThinkingContinuation)
    }
}

/// Classify one line (without its trailing newline).
///
/// Pure and line-local: a line that matches no marker is [`LineKind::Plain`].
pub fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();
    if TOOL_CALL_GLYPHS
        .iter()
        .any(|glyph| trimmed.starts_with(glyph))
    {
        LineKind::ToolCall
    } else if THINKING_CONTINUATION.is_match(trimmed) {
        LineKind::ThinkingContinuation
    } else if THINKING_START.is_match(trimmed) {
        LineKind::ThinkingStart
    } else if DIVIDER.is_match(trimmed) {
        LineKind::Divider
    } else if RESPONSE_START.is_match(trimmed) {
        LineKind::ResponseStart
    } else {
        LineKind::Plain
    }
}

/// Put every marker at the start of its own line.
///
/// Streams frequently glue markers to surrounding text (`---## 回复：`,
/// `done.## 思考过程：`, `## 回复：Hello`). The classifier only recognizes
/// markers at line start, so this pass inserts the missing line breaks.
pub fn normalize_markers(text: &str) -> String {
    let text = DIVIDER_BEFORE_MARKER.replace_all(text, "---\n${1}");
    let text = TEXT_BEFORE_MARKER.replace_all(&text, "${1}\n${2}");
    TEXT_AFTER_MARKER
        .replace_all(&text, "${1}\n${2}")
        .into_owned()
}
