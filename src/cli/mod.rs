//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod render;
pub mod stream;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::render::{render_text, replay_transcript, segments_json};
use crate::cli::stream::{stream_text, StreamOptions};
use crate::core::config::{path_display, Config, ConfigKey};
use crate::utils::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "chatpace")]
#[command(about = "Render streamed chat output into thinking, tool-call and response blocks")]
#[command(
    long_about = "chatpace splits model output into collapsible thinking blocks, tool-call hints \
and the final response, and paces streamed text with a typewriter effect.\n\n\
Markers:\n\
  ## 思考过程：      Start a thinking block (also 'Thinking Process:')\n\
  ## 回复：          Start the response (also 'Response:' / 'Final Answer:')\n\
  ---               Divider between reasoning and response\n\
  📖 ✅ ✏️ 🔧 ...      Tool-call hint lines\n\n\
Environment Variables:\n\
  CHATPACE_LOG      Tracing filter directive (e.g. 'debug', 'chatpace=trace')"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Use this config file instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log lifecycle details to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a complete assistant message to HTML
    Render {
        /// Text file holding the message
        file: PathBuf,
    },
    /// Print the segment plan of a message as JSON
    Segments {
        /// Text file holding the message
        file: PathBuf,
    },
    /// Stream a message through the typewriter and print the final HTML
    Stream {
        /// Text file holding the message
        file: PathBuf,
        /// Graphemes per simulated chunk
        #[arg(long, default_value_t = 8)]
        chunk_size: usize,
        /// Milliseconds between simulated chunks
        #[arg(long, default_value_t = 20)]
        interval_ms: u64,
        /// Print every intermediate render
        #[arg(long)]
        ticks: bool,
        /// User prompt to record ahead of the reply
        #[arg(long)]
        prompt: Option<String>,
        /// Write the resulting transcript as JSON
        #[arg(long, value_name = "PATH")]
        transcript: Option<PathBuf>,
    },
    /// Render every message of a saved JSON transcript
    Replay {
        /// Transcript file written by `stream --transcript`
        file: PathBuf,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (default)
    Show,
    /// Print the config file location
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key to set (e.g. typewriter-base-ms)
        key: String,
        /// Value to set for the key (can be multiple words for thinking-label)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(args))
}

fn config_path(args: &Args) -> Result<PathBuf, Box<dyn Error>> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => Ok(Config::get_config_path()?),
    }
}

fn read_input(path: &Path) -> Result<String, Box<dyn Error>> {
    fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path_display(path)).into())
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let path = config_path(&args)?;
    let mut config = Config::load_from_path(&path)?;

    match args.command {
        Commands::Render { file } => {
            let text = read_input(&file)?;
            println!("{}", render_text(&text, &config.render_options()));
        }
        Commands::Segments { file } => {
            let text = read_input(&file)?;
            println!("{}", segments_json(&text)?);
        }
        Commands::Stream {
            file,
            chunk_size,
            interval_ms,
            ticks,
            prompt,
            transcript,
        } => {
            let text = read_input(&file)?;
            let options = StreamOptions {
                chunk_size,
                interval: Duration::from_millis(interval_ms),
                echo_ticks: ticks,
                prompt,
                transcript_out: transcript,
            };
            let markup = stream_text(&text, &config, options).await?;
            println!("{markup}");
        }
        Commands::Replay { file } => {
            let json = read_input(&file)?;
            println!("{}", replay_transcript(&json, &config.render_options())?);
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => config.print_all(),
            ConfigAction::Path => println!("{}", path_display(&path)),
            ConfigAction::Set { key, value } => {
                let key: ConfigKey = key.parse()?;
                let value = value.join(" ");
                config.set_value(key, &value)?;
                config.save_to_path(&path)?;
                println!("✅ Set {} to: {value}", key.name());
            }
            ConfigAction::Unset { key } => {
                let key: ConfigKey = key.parse()?;
                config.unset_value(key);
                config.save_to_path(&path)?;
                println!("✅ Unset {}", key.name());
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_flags() {
        let args = Args::try_parse_from([
            "chatpace",
            "-v",
            "stream",
            "reply.md",
            "--chunk-size",
            "3",
            "--ticks",
        ])
        .expect("valid args");
        assert!(args.verbose);
        match args.command {
            Commands::Stream {
                file,
                chunk_size,
                interval_ms,
                ticks,
                ..
            } => {
                assert_eq!(file, PathBuf::from("reply.md"));
                assert_eq!(chunk_size, 3);
                assert_eq!(interval_ms, 20);
                assert!(ticks);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_set_joins_words() {
        let args = Args::try_parse_from([
            "chatpace",
            "--config",
            "/tmp/c.toml",
            "config",
            "set",
            "thinking-label",
            "Model",
            "reasoning",
        ])
        .expect("valid args");
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        match args.command {
            Commands::Config {
                action: Some(ConfigAction::Set { key, value }),
            } => {
                assert_eq!(key, "thinking-label");
                assert_eq!(value.join(" "), "Model reasoning");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bare_config_defaults_to_show() {
        let args = Args::try_parse_from(["chatpace", "config"]).expect("valid args");
        assert!(matches!(args.command, Commands::Config { action: None }));
    }

    #[test]
    fn missing_input_file_reports_path() {
        let err = read_input(Path::new("/definitely/not/here.md")).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to read "));
        assert!(message.contains("not/here.md"));
    }
}
