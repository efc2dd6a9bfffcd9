use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

use super::blocks::{RenderError, RenderOptions};
use crate::utils::html::{escape_html, sanitize_language};
use crate::utils::syntax::highlight_code_html;

const UNSAFE_URL_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

fn language_hint_from_codeblock_kind(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Indented => String::new(),
        CodeBlockKind::Fenced(info) => info.split_ascii_whitespace().next().unwrap_or("").into(),
    }
}

fn is_unsafe_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    UNSAFE_URL_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    if is_unsafe_url(&url) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

fn code_block_html(
    lang_hint: &str,
    code: &str,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let class = sanitize_language(lang_hint);
    let mut out = if class.is_empty() {
        String::from("<pre><code>")
    } else {
        format!("<pre><code class=\"language-{class}\">")
    };

    let highlighted = if options.syntax {
        highlight_code_html(lang_hint, code, &options.syntax_theme)?
    } else {
        None
    };
    match highlighted {
        Some(spans) => out.push_str(&spans),
        None => out.push_str(&escape_html(code)),
    }
    out.push_str("</code></pre>\n");
    Ok(out)
}

/// Render complete markdown to sanitized HTML.
///
/// Raw HTML in the input is emitted as escaped text, link and image targets
/// with script-capable schemes are neutralized, and code blocks are syntax
/// highlighted when `options.syntax` is set.
pub fn render_markdown(text: &str, options: &RenderOptions) -> Result<String, RenderError> {
    let mut parser_options = Options::empty();
    parser_options.insert(Options::ENABLE_STRIKETHROUGH);
    parser_options.insert(Options::ENABLE_TABLES);
    parser_options.insert(Options::ENABLE_TASKLISTS);
    parser_options.insert(Options::ENABLE_FOOTNOTES);
    let parser = Parser::new_ext(text, parser_options);

    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code_block: Option<(String, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                code_block = Some((language_hint_from_codeblock_kind(&kind), String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, code)) = code_block.take() {
                    events.push(Event::Html(code_block_html(&lang, &code, options)?.into()));
                }
            }
            Event::Text(content) if code_block.is_some() => {
                if let Some((_, code)) = code_block.as_mut() {
                    code.push_str(&content);
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            Event::SoftBreak if options.soft_breaks => events.push(Event::HardBreak),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => events.push(Event::Start(Tag::Link {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            })),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => events.push(Event::Start(Tag::Image {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            })),
            other => events.push(other),
        }
    }

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    Ok(out)
}
