use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::core::typewriter::PacingConfig;
use crate::ui::blocks::RenderOptions;

/// User configuration. Every field is optional; unset fields fall back to
/// the defaults of [`PacingConfig`] and [`RenderOptions`].
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Milliseconds per grapheme at normal pace
    pub typewriter_base_ms: Option<u64>,
    /// Milliseconds per grapheme while catching up
    pub typewriter_fast_ms: Option<u64>,
    /// Milliseconds per grapheme when the queue runs low
    pub typewriter_slow_ms: Option<u64>,
    /// Re-check interval while buffering before the first reveal
    pub buffer_delay_ms: Option<u64>,
    /// Queued graphemes required before the first reveal
    pub buffer_threshold: Option<usize>,
    /// Remainder size revealed in one step once the stream ends
    pub flush_threshold: Option<usize>,
    /// Summary label of collapsible thinking blocks
    pub thinking_label: Option<String>,
    /// Enable syntax highlighting for code blocks in final renders
    pub syntax: Option<bool>,
    /// syntect theme name (e.g., "InspiredGitHub", "base16-ocean.dark")
    pub syntax_theme: Option<String>,
    /// Render single newlines as line breaks in final renders
    pub soft_breaks: Option<bool>,
    /// Show the typing cursor while streaming
    pub typing_cursor: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    TypewriterBaseMs,
    TypewriterFastMs,
    TypewriterSlowMs,
    BufferDelayMs,
    BufferThreshold,
    FlushThreshold,
    ThinkingLabel,
    Syntax,
    SyntaxTheme,
    SoftBreaks,
    TypingCursor,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 11] = [
        ConfigKey::TypewriterBaseMs,
        ConfigKey::TypewriterFastMs,
        ConfigKey::TypewriterSlowMs,
        ConfigKey::BufferDelayMs,
        ConfigKey::BufferThreshold,
        ConfigKey::FlushThreshold,
        ConfigKey::ThinkingLabel,
        ConfigKey::Syntax,
        ConfigKey::SyntaxTheme,
        ConfigKey::SoftBreaks,
        ConfigKey::TypingCursor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::TypewriterBaseMs => "typewriter-base-ms",
            ConfigKey::TypewriterFastMs => "typewriter-fast-ms",
            ConfigKey::TypewriterSlowMs => "typewriter-slow-ms",
            ConfigKey::BufferDelayMs => "buffer-delay-ms",
            ConfigKey::BufferThreshold => "buffer-threshold",
            ConfigKey::FlushThreshold => "flush-threshold",
            ConfigKey::ThinkingLabel => "thinking-label",
            ConfigKey::Syntax => "syntax",
            ConfigKey::SyntaxTheme => "syntax-theme",
            ConfigKey::SoftBreaks => "soft-breaks",
            ConfigKey::TypingCursor => "typing-cursor",
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ConfigValueError::UnknownKey(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValueError {
    UnknownKey(String),
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl fmt::Display for ConfigValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValueError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            ConfigValueError::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "Invalid value '{value}' for {key}: expected {expected}"),
        }
    }
}

impl std::error::Error for ConfigValueError {}

fn parse_number<T: FromStr>(key: ConfigKey, value: &str) -> Result<T, ConfigValueError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigValueError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
            expected: "a non-negative integer",
        })
}

fn parse_switch(key: ConfigKey, value: &str) -> Result<bool, ConfigValueError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigValueError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
            expected: "on or off",
        }),
    }
}

fn parse_text(key: ConfigKey, value: &str) -> Result<String, ConfigValueError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigValueError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
            expected: "a non-empty string",
        });
    }
    Ok(trimmed.to_string())
}

fn switch_label(on: bool) -> String {
    let label = if on { "on" } else { "off" };
    label.to_string()
}

impl Config {
    /// Typewriter pacing with defaults filled in.
    pub fn pacing(&self) -> PacingConfig {
        let defaults = PacingConfig::default();
        PacingConfig {
            base_delay: self
                .typewriter_base_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            fast_delay: self
                .typewriter_fast_ms
                .map_or(defaults.fast_delay, Duration::from_millis),
            slow_delay: self
                .typewriter_slow_ms
                .map_or(defaults.slow_delay, Duration::from_millis),
            buffer_delay: self
                .buffer_delay_ms
                .map_or(defaults.buffer_delay, Duration::from_millis),
            buffer_threshold: self.buffer_threshold.unwrap_or(defaults.buffer_threshold),
            flush_threshold: self.flush_threshold.unwrap_or(defaults.flush_threshold),
            ..defaults
        }
    }

    /// Markup options with defaults filled in.
    pub fn render_options(&self) -> RenderOptions {
        let defaults = RenderOptions::default();
        RenderOptions {
            thinking_label: self
                .thinking_label
                .clone()
                .unwrap_or(defaults.thinking_label),
            syntax: self.syntax.unwrap_or(defaults.syntax),
            syntax_theme: self.syntax_theme.clone().unwrap_or(defaults.syntax_theme),
            soft_breaks: self.soft_breaks.unwrap_or(defaults.soft_breaks),
            typing_cursor: self.typing_cursor.unwrap_or(defaults.typing_cursor),
        }
    }

    pub fn set_value(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigValueError> {
        match key {
            ConfigKey::TypewriterBaseMs => self.typewriter_base_ms = Some(parse_number(key, value)?),
            ConfigKey::TypewriterFastMs => self.typewriter_fast_ms = Some(parse_number(key, value)?),
            ConfigKey::TypewriterSlowMs => self.typewriter_slow_ms = Some(parse_number(key, value)?),
            ConfigKey::BufferDelayMs => self.buffer_delay_ms = Some(parse_number(key, value)?),
            ConfigKey::BufferThreshold => self.buffer_threshold = Some(parse_number(key, value)?),
            ConfigKey::FlushThreshold => self.flush_threshold = Some(parse_number(key, value)?),
            ConfigKey::ThinkingLabel => self.thinking_label = Some(parse_text(key, value)?),
            ConfigKey::Syntax => self.syntax = Some(parse_switch(key, value)?),
            ConfigKey::SyntaxTheme => self.syntax_theme = Some(parse_text(key, value)?),
            ConfigKey::SoftBreaks => self.soft_breaks = Some(parse_switch(key, value)?),
            ConfigKey::TypingCursor => self.typing_cursor = Some(parse_switch(key, value)?),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::TypewriterBaseMs => self.typewriter_base_ms = None,
            ConfigKey::TypewriterFastMs => self.typewriter_fast_ms = None,
            ConfigKey::TypewriterSlowMs => self.typewriter_slow_ms = None,
            ConfigKey::BufferDelayMs => self.buffer_delay_ms = None,
            ConfigKey::BufferThreshold => self.buffer_threshold = None,
            ConfigKey::FlushThreshold => self.flush_threshold = None,
            ConfigKey::ThinkingLabel => self.thinking_label = None,
            ConfigKey::Syntax => self.syntax = None,
            ConfigKey::SyntaxTheme => self.syntax_theme = None,
            ConfigKey::SoftBreaks => self.soft_breaks = None,
            ConfigKey::TypingCursor => self.typing_cursor = None,
        }
    }

    /// The effective value of `key` and whether it was set explicitly.
    pub fn effective_value(&self, key: ConfigKey) -> (String, bool) {
        let pacing = self.pacing();
        let render = self.render_options();
        match key {
            ConfigKey::TypewriterBaseMs => (
                pacing.base_delay.as_millis().to_string(),
                self.typewriter_base_ms.is_some(),
            ),
            ConfigKey::TypewriterFastMs => (
                pacing.fast_delay.as_millis().to_string(),
                self.typewriter_fast_ms.is_some(),
            ),
            ConfigKey::TypewriterSlowMs => (
                pacing.slow_delay.as_millis().to_string(),
                self.typewriter_slow_ms.is_some(),
            ),
            ConfigKey::BufferDelayMs => (
                pacing.buffer_delay.as_millis().to_string(),
                self.buffer_delay_ms.is_some(),
            ),
            ConfigKey::BufferThreshold => (
                pacing.buffer_threshold.to_string(),
                self.buffer_threshold.is_some(),
            ),
            ConfigKey::FlushThreshold => (
                pacing.flush_threshold.to_string(),
                self.flush_threshold.is_some(),
            ),
            ConfigKey::ThinkingLabel => (render.thinking_label, self.thinking_label.is_some()),
            ConfigKey::Syntax => (switch_label(render.syntax), self.syntax.is_some()),
            ConfigKey::SyntaxTheme => (render.syntax_theme, self.syntax_theme.is_some()),
            ConfigKey::SoftBreaks => (switch_label(render.soft_breaks), self.soft_breaks.is_some()),
            ConfigKey::TypingCursor => (
                switch_label(render.typing_cursor),
                self.typing_cursor.is_some(),
            ),
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
