use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, OnceLock};

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{styled_line_to_highlighted_html, IncludeBackground};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::debug;

pub const DEFAULT_SYNTAX_THEME: &str = "InspiredGitHub";

const FALLBACK_THEMES: [&str; 3] = ["base16-ocean.light", "Solarized (light)", "base16-ocean.dark"];
const CACHE_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum HighlightError {
    NoTheme(String),
    Syntect(syntect::Error),
}

impl fmt::Display for HighlightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HighlightError::NoTheme(name) => {
                write!(f, "no syntax theme named '{name}' and no fallback available")
            }
            HighlightError::Syntect(err) => write!(f, "highlighting failed: {err}"),
        }
    }
}

impl std::error::Error for HighlightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HighlightError::Syntect(err) => Some(err),
            HighlightError::NoTheme(_) => None,
        }
    }
}

impl From<syntect::Error> for HighlightError {
    fn from(err: syntect::Error) -> Self {
        HighlightError::Syntect(err)
    }
}

// Bounded FIFO cache of highlighted blocks, keyed by (lang_norm, hash).
fn hash_code(lang: &str, code: &str, theme_name: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    lang.hash(&mut hasher);
    code.hash(&mut hasher);
    theme_name.hash(&mut hasher);
    hasher.finish()
}

struct SimpleCache {
    map: HashMap<(String, u64), String>,
    order: VecDeque<(String, u64)>,
    cap: usize,
}

impl SimpleCache {
    fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    fn get(&self, k: &(String, u64)) -> Option<String> {
        self.map.get(k).cloned()
    }

    fn put(&mut self, k: (String, u64), v: String) {
        if !self.map.contains_key(&k) {
            self.order.push_back(k.clone());
        }
        self.map.insert(k, v);
        while self.map.len() > self.cap {
            match self.order.pop_front() {
                Some(old) => {
                    self.map.remove(&old);
                }
                None => break,
            }
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

static SYNTAX_CACHE: Mutex<Option<SimpleCache>> = Mutex::new(None);

fn get_cache() -> MutexGuard<'static, Option<SimpleCache>> {
    SYNTAX_CACHE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

pub(crate) fn normalize_lang_hint(s: &str) -> String {
    let t = s.trim().to_ascii_lowercase();
    match t.as_str() {
        "py" | "python" => "python".into(),
        "bash" | "sh" | "zsh" | "shell" => "bash".into(),
        "js" | "javascript" | "jsx" => "javascript".into(),
        "ts" | "tsx" | "typescript" => "typescript".into(),
        "json" => "json".into(),
        "toml" => "toml".into(),
        "yaml" | "yml" => "yaml".into(),
        "rust" | "rs" => "rust".into(),
        "go" => "go".into(),
        "c" | "h" => "c".into(),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp".into(),
        "java" => "java".into(),
        "html" => "html".into(),
        "css" => "css".into(),
        "sql" => "sql".into(),
        other => other.into(),
    }
}

/// Resolve a theme by name, falling back through a fixed list.
pub(crate) fn resolve_theme(name: &str) -> Option<(&'static str, &'static Theme)> {
    let themes = &theme_set().themes;
    if let Some((key, theme)) = themes.get_key_value(name) {
        return Some((key.as_str(), theme));
    }
    debug!(theme = name, "unknown syntax theme, trying fallbacks");
    FALLBACK_THEMES
        .iter()
        .find_map(|fallback| themes.get_key_value(*fallback))
        .map(|(key, theme)| (key.as_str(), theme))
}

/// Highlight `code` as HTML spans with inline colors.
///
/// Returns `Ok(None)` when the hint names no known syntax; callers render
/// the block as escaped plain code in that case. The returned markup belongs
/// inside a `<pre><code>` element and has all code text escaped.
pub fn highlight_code_html(
    lang_hint: &str,
    code: &str,
    theme_name: &str,
) -> Result<Option<String>, HighlightError> {
    let lang_norm = normalize_lang_hint(lang_hint);
    if lang_norm.is_empty() {
        return Ok(None);
    }

    let ps = syntax_set();
    let Some(syntax) = ps.find_syntax_by_token(&lang_norm) else {
        return Ok(None);
    };
    let (resolved_theme, theme) =
        resolve_theme(theme_name).ok_or_else(|| HighlightError::NoTheme(theme_name.to_string()))?;

    let key = (lang_norm.clone(), hash_code(&lang_norm, code, resolved_theme));
    if let Some(html) = get_cache().as_ref().and_then(|c| c.get(&key)) {
        return Ok(Some(html));
    }

    let mut highlighter = HighlightLines::new(syntax, theme);
    let mut html = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter.highlight_line(line, ps)?;
        html.push_str(&styled_line_to_highlighted_html(
            &ranges[..],
            IncludeBackground::No,
        )?);
    }

    get_cache()
        .get_or_insert_with(|| SimpleCache::new(CACHE_CAPACITY))
        .put(key, html.clone());
    Ok(Some(html))
}

#[cfg(test)]
pub(crate) fn cached_blocks() -> usize {
    get_cache().as_ref().map_or(0, SimpleCache::len)
}
