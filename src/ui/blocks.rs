//! Block-level markup for segment plans.
//!
//! Streaming renders go through the fast renderer; final renders go through
//! full markdown and are guarded per block, so one malformed block degrades to
//! escaped preformatted text without affecting its neighbours.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use super::fast::{format_inline, render_fast};
use super::full::render_markdown;
use crate::core::message::Message;
use crate::core::segments::{build_segments, Segment, SegmentPlan};
use crate::utils::html::escape_html;
use crate::utils::syntax::{HighlightError, DEFAULT_SYNTAX_THEME};

pub const DEFAULT_THINKING_LABEL: &str = "思考过程";
pub const DIVIDER_RULE: &str = "<hr class=\"response-divider\">";
pub const TYPING_CURSOR: &str = "<span class=\"typing-cursor\">▎</span>";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Content is still arriving; uses the fast renderer.
    Streaming,
    /// Content is complete; uses full markdown with highlighting.
    Final,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub thinking_label: String,
    pub syntax: bool,
    pub syntax_theme: String,
    pub soft_breaks: bool,
    pub typing_cursor: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            thinking_label: DEFAULT_THINKING_LABEL.to_string(),
            syntax: true,
            syntax_theme: DEFAULT_SYNTAX_THEME.to_string(),
            soft_breaks: true,
            typing_cursor: true,
        }
    }
}

#[derive(Debug)]
pub enum RenderError {
    Highlight(HighlightError),
    Panicked(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Highlight(err) => write!(f, "{err}"),
            RenderError::Panicked(msg) => write!(f, "markdown renderer panicked: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Highlight(err) => Some(err),
            RenderError::Panicked(_) => None,
        }
    }
}

impl From<HighlightError> for RenderError {
    fn from(err: HighlightError) -> Self {
        RenderError::Highlight(err)
    }
}

/// Render a whole plan, including the divider rule and the optional cursor.
pub fn render_plan(plan: &SegmentPlan, mode: RenderMode, options: &RenderOptions) -> String {
    let mut html = String::new();
    for (index, segment) in plan.segments.iter().enumerate() {
        if plan.divider_at == Some(index) {
            html.push_str(DIVIDER_RULE);
        }
        html.push_str(&render_segment(segment, mode, options));
    }
    if plan.divider_at == Some(plan.segments.len()) {
        html.push_str(DIVIDER_RULE);
    }
    if mode == RenderMode::Streaming && options.typing_cursor {
        html.push_str(TYPING_CURSOR);
    }
    html
}

pub fn render_segment(segment: &Segment, mode: RenderMode, options: &RenderOptions) -> String {
    match segment {
        Segment::ToolCall(line) => format!(
            "<div class=\"tool-call-hint\">{}</div>",
            format_inline(&escape_html(line))
        ),
        Segment::Thinking(lines) => {
            let body = render_block(&lines.join("\n"), mode, options);
            format!(
                "<details class=\"thinking-process\" open>\
                 <summary class=\"thinking-process-header\">\
                 <span class=\"thinking-icon\">🤔</span> {}</summary>\
                 <div class=\"thinking-process-content\">{body}</div></details>",
                escape_html(&options.thinking_label)
            )
        }
        Segment::Response(lines) => render_block(&lines.join("\n"), mode, options),
    }
}

/// Replay a stored message through the final pipeline.
pub fn render_message(message: &Message, options: &RenderOptions) -> String {
    if message.is_assistant() {
        let plan = build_segments(&message.content);
        return render_plan(&plan, RenderMode::Final, options);
    }
    let lines: Vec<String> = message.content.lines().map(escape_html).collect();
    format!("<div class=\"user-message\">{}</div>", lines.join("<br>"))
}

/// Render a transport failure as a finalized message body.
pub fn render_stream_error(message: &str, options: &RenderOptions) -> String {
    format!(
        "<div class=\"stream-error\">{}</div>",
        render_block(message, RenderMode::Final, options)
    )
}

fn render_block(text: &str, mode: RenderMode, options: &RenderOptions) -> String {
    match mode {
        RenderMode::Streaming => render_fast(text),
        RenderMode::Final => match guard_render(|| render_markdown(text, options)) {
            Ok(html) => html,
            Err(err) => {
                warn!(error = %err, "block render failed; using plain fallback");
                fallback_block(text)
            }
        },
    }
}

fn guard_render<F>(render: F) -> Result<String, RenderError>
where
    F: FnOnce() -> Result<String, RenderError>,
{
    match panic::catch_unwind(AssertUnwindSafe(render)) {
        Ok(result) => result,
        Err(payload) => Err(RenderError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn fallback_block(text: &str) -> String {
    format!("<pre class=\"render-fallback\">{}</pre>", escape_html(text))
}
