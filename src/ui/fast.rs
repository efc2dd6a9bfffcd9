//! Lightweight markdown for text that is still streaming.
//!
//! Input is escaped before any transform runs, and every construct is
//! recognized line by line, so a half-received fence or emphasis marker can
//! only ever produce plain text, never unbalanced markup.

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::html::{escape_html, sanitize_language};

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\n]+)`").expect("inline code pattern"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("bold pattern"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("italic pattern"));
static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*+]\s+(.*)$").expect("bullet pattern"));
static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+(.*)$").expect("ordered item pattern"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Bullet => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

enum Piece<'a> {
    Prose(Vec<&'a str>),
    Code { lang: String, lines: Vec<&'a str> },
}

/// Render block text with the streaming-safe subset of markdown.
pub fn render_fast(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let escaped = escape_html(trimmed);
    let mut html = String::new();
    for piece in split_fences(&escaped) {
        match piece {
            Piece::Code { lang, lines } => push_code_block(&mut html, &lang, &lines),
            Piece::Prose(lines) => push_paragraphs(&mut html, &lines),
        }
    }
    html
}

/// Inline code, bold and italic for a single escaped line.
pub(crate) fn format_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for caps in INLINE_CODE.captures_iter(line) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&emphasize(&line[last..whole.start()]));
        out.push_str("<code>");
        out.push_str(code.as_str());
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&emphasize(&line[last..]));
    out
}

fn emphasize(text: &str) -> String {
    let bold = BOLD.replace_all(text, "<strong>${1}</strong>");
    ITALIC.replace_all(&bold, "<em>${1}</em>").into_owned()
}

fn split_fences(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut code: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        match line.trim_start().strip_prefix("```") {
            Some(info) => match code.take() {
                Some((lang, lines)) => pieces.push(Piece::Code { lang, lines }),
                None => {
                    if !prose.is_empty() {
                        pieces.push(Piece::Prose(std::mem::take(&mut prose)));
                    }
                    let lang = sanitize_language(info.split_whitespace().next().unwrap_or(""));
                    code = Some((lang, Vec::new()));
                }
            },
            None => match code.as_mut() {
                Some((_, lines)) => lines.push(line),
                None => prose.push(line),
            },
        }
    }

    // An unterminated fence runs to the end of the block.
    if let Some((lang, lines)) = code {
        pieces.push(Piece::Code { lang, lines });
    }
    if !prose.is_empty() {
        pieces.push(Piece::Prose(prose));
    }
    pieces
}

fn push_code_block(html: &mut String, lang: &str, lines: &[&str]) {
    if lang.is_empty() {
        html.push_str("<pre><code>");
    } else {
        html.push_str(&format!("<pre><code class=\"language-{lang}\">"));
    }
    html.push_str(&lines.join("\n"));
    html.push_str("</code></pre>");
}

fn push_paragraphs(html: &mut String, lines: &[&str]) {
    for paragraph in lines.split(|line| line.trim().is_empty()) {
        let Some(first) = paragraph.first() else {
            continue;
        };
        match list_item(first.trim()) {
            Some((kind, _)) => push_list(html, kind, paragraph),
            None => {
                let rendered: Vec<String> = paragraph
                    .iter()
                    .map(|line| format_inline(line.trim()))
                    .collect();
                html.push_str("<p>");
                html.push_str(&rendered.join("<br>"));
                html.push_str("</p>");
            }
        }
    }
}

fn list_item(line: &str) -> Option<(ListKind, &str)> {
    if let Some(rest) = BULLET_ITEM.captures(line).and_then(|c| c.get(1)) {
        return Some((ListKind::Bullet, rest.as_str()));
    }
    ORDERED_ITEM
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|rest| (ListKind::Ordered, rest.as_str()))
}

fn push_list(html: &mut String, kind: ListKind, lines: &[&str]) {
    let mut items: Vec<String> = Vec::new();
    for line in lines {
        let line = line.trim();
        match (list_item(line), items.last_mut()) {
            (Some((_, rest)), _) => items.push(format_inline(rest)),
            (None, Some(last)) => {
                last.push_str("<br>");
                last.push_str(&format_inline(line));
            }
            (None, None) => items.push(format_inline(line)),
        }
    }

    let tag = kind.tag();
    html.push_str(&format!("<{tag}>"));
    for item in items {
        html.push_str("<li>");
        html.push_str(&item);
        html.push_str("</li>");
    }
    html.push_str(&format!("</{tag}>"));
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN_TAGS: &[&str] = &[
        "<p>", "</p>", "<br>", "<strong>", "</strong>", "<em>", "</em>", "<code>", "</code>",
        "<pre>", "</pre>", "<ul>", "</ul>", "<ol>", "</ol>", "<li>", "</li>",
    ];

    fn strip_own_tags(html: &str) -> String {
        let mut out = html.replace("<code class=\"language-", "");
        out = out.replace("\">", "");
        for tag in OWN_TAGS {
            out = out.replace(tag, "");
        }
        out
    }

    #[test]
    fn blank_input_renders_nothing() {
        assert_eq!(render_fast(""), "");
        assert_eq!(render_fast("  \n\n "), "");
    }

    #[test]
    fn html_in_input_is_escaped() {
        assert_eq!(
            render_fast("<script>alert('x')</script>"),
            "<p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn untrusted_angle_brackets_never_survive() {
        let inputs = [
            "<img src=x onerror=alert(1)>",
            "**<b>bold</b>**",
            "`<div>` and *<i>*",
            "- <li>item</li>\n- two",
            "```html\n<body></body>\n```",
            "```\n<unterminated",
        ];
        for input in inputs {
            let rendered = strip_own_tags(&render_fast(input));
            assert!(
                !rendered.contains('<') && !rendered.contains('>'),
                "raw markup leaked from {input:?}: {rendered}"
            );
        }
    }

    #[test]
    fn emphasis_and_inline_code() {
        assert_eq!(
            render_fast("**bold** and *italic*"),
            "<p><strong>bold</strong> and <em>italic</em></p>"
        );
        assert_eq!(
            render_fast("`a*b*c` then *x*"),
            "<p><code>a*b*c</code> then <em>x</em></p>"
        );
    }

    #[test]
    fn fenced_code_blocks_keep_their_language() {
        assert_eq!(
            render_fast("```rust\nfn main() {}\n```"),
            "<pre><code class=\"language-rust\">fn main() {}</code></pre>"
        );
    }

    #[test]
    fn unterminated_fence_renders_as_code() {
        assert_eq!(
            render_fast("intro\n```py\nprint(1)"),
            "<p>intro</p><pre><code class=\"language-py\">print(1)</code></pre>"
        );
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        assert_eq!(render_fast("a\nb\n\nc"), "<p>a<br>b</p><p>c</p>");
    }

    #[test]
    fn bullet_and_numbered_lists() {
        assert_eq!(
            render_fast("- one\n* **two**"),
            "<ul><li>one</li><li><strong>two</strong></li></ul>"
        );
        assert_eq!(
            render_fast("1. first\n2. second\n   more"),
            "<ol><li>first</li><li>second<br>more</li></ol>"
        );
    }

    #[test]
    fn half_received_emphasis_stays_literal() {
        assert_eq!(render_fast("**bol"), "<p>**bol</p>");
        assert_eq!(render_fast("`cod"), "<p>`cod</p>");
    }
}
