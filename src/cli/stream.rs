//! Simulated chunked transport for exercising the pacing loop end to end.

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::config::Config;
use crate::core::driver::{spawn_driver, StreamHandle};
use crate::core::message::Message;
use crate::core::orchestrator::{MessageView, Orchestrator};
use crate::core::transcript::Transcript;

#[derive(Clone, Debug)]
pub struct StreamOptions {
    /// Graphemes per simulated chunk.
    pub chunk_size: usize,
    /// Pause between chunks.
    pub interval: Duration,
    /// Print every intermediate render.
    pub echo_ticks: bool,
    /// User prompt recorded ahead of the assistant reply.
    pub prompt: Option<String>,
    pub transcript_out: Option<PathBuf>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8,
            interval: Duration::from_millis(20),
            echo_ticks: false,
            prompt: None,
            transcript_out: None,
        }
    }
}

/// View that keeps the latest markup of each stream and can echo every
/// update.
#[derive(Debug, Default)]
pub struct ConsoleView {
    messages: BTreeMap<u64, String>,
    updates: usize,
    echo: bool,
}

impl ConsoleView {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Markup of the most recent stream's message.
    pub fn into_markup(self) -> String {
        self.messages
            .into_values()
            .next_back()
            .unwrap_or_default()
    }
}

impl MessageView for ConsoleView {
    fn begin_message(&mut self, stream_id: u64) {
        self.messages.begin_message(stream_id);
    }

    fn set_markup(&mut self, stream_id: u64, markup: &str) {
        self.messages.set_markup(stream_id, markup);
        self.updates += 1;
        if self.echo {
            println!("{markup}");
        }
    }

    fn scroll_to_latest(&mut self) {}
}

pub(crate) fn split_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    graphemes
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.concat())
        .collect()
}

async fn simulate_transport(
    handle: StreamHandle,
    stream_id: u64,
    cancel_token: CancellationToken,
    chunks: Vec<String>,
    interval: Duration,
) {
    for chunk in chunks {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(stream_id, "transport cancelled");
                return;
            }
            _ = time::sleep(interval) => {}
        }
        if !handle.on_chunk(stream_id, chunk) {
            return;
        }
    }
    handle.on_end(stream_id);
}

/// Stream `text` through the typewriter and return the final markup.
pub async fn stream_text(
    text: &str,
    config: &Config,
    options: StreamOptions,
) -> Result<String, Box<dyn Error>> {
    let mut transcript = Transcript::new();
    if let Some(prompt) = &options.prompt {
        transcript.push(Message::user(prompt.as_str()));
    }

    let orchestrator = Orchestrator::new(
        ConsoleView::new(options.echo_ticks),
        transcript,
        config.render_options(),
    );
    let (handle, join) = spawn_driver(orchestrator, config.pacing());

    let (stream_id, cancel_token) = handle.start_stream();
    let chunks = split_chunks(text, options.chunk_size);
    debug!(stream_id, chunks = chunks.len(), "starting simulated transport");
    tokio::spawn(simulate_transport(
        handle.clone(),
        stream_id,
        cancel_token,
        chunks,
        options.interval,
    ))
    .await?;

    handle.await_drain().await?;
    handle.shutdown();
    let (view, transcript) = join.await?.into_parts();
    debug!(updates = view.updates(), "stream rendered");

    if let Some(path) = &options.transcript_out {
        fs::write(path, transcript.to_json()?)?;
    }
    Ok(view.into_markup())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn chunks_split_on_grapheme_boundaries() {
        assert_eq!(split_chunks("ab✏️cd", 3), vec!["ab✏️", "cd"]);
        assert_eq!(split_chunks("xyz", 0), vec!["x", "y", "z"]);
        assert!(split_chunks("", 4).is_empty());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn streamed_text_matches_final_render_and_saves_transcript() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let transcript_path = temp_dir.path().join("transcript.json");
        let config = Config {
            syntax: Some(false),
            ..Default::default()
        };
        let text = "## 思考过程：\n查看文件\n✅ 已读取 `main.rs`\n---\n## 回复：\n完成 **ok**";
        let options = StreamOptions {
            chunk_size: 5,
            prompt: Some("读一下 main.rs".to_string()),
            transcript_out: Some(transcript_path.clone()),
            ..StreamOptions::default()
        };

        let markup = stream_text(text, &config, options).await.expect("stream ok");
        assert_eq!(
            markup,
            crate::cli::render::render_text(text, &config.render_options())
        );

        let saved = Transcript::from_json(&fs::read_to_string(&transcript_path).unwrap()).unwrap();
        let messages: Vec<_> = saved.messages().cloned().collect();
        assert_eq!(
            messages,
            vec![Message::user("读一下 main.rs"), Message::assistant(text)]
        );
    }
}
