//! Markup layer for assistant output.
//!
//! - [`fast`]: a streaming-safe subset of markdown, re-run on every tick.
//! - [`full`]: complete markdown with syntax highlighting for finished text.
//! - [`blocks`]: wrappers for tool-call, thinking and response segments, the
//!   divider rule, the typing cursor, and per-block fallback on failure.

pub mod blocks;
pub mod fast;
pub mod full;
