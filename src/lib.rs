//! chatpace renders incrementally arriving chat output into structured markup.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns marker classification, segment building, typewriter
//!   pacing, per-stream sessions, and the driver task that ties them to a
//!   view and a history sink.
//! - [`ui`] turns segment plans into HTML, with a fast renderer for text that
//!   is still streaming and full markdown for completed messages.
//! - [`utils`] holds escaping, syntax highlighting, and logging setup.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which loads configuration and dispatches
//! the `render`, `segments`, `stream`, `replay` and `config` commands.

pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
