use std::collections::BTreeMap;

use tracing::warn;

use super::message::Message;
use super::segments::build_segments;
use crate::ui::blocks::{render_plan, render_stream_error, RenderMode, RenderOptions};

/// Destination for rendered assistant messages.
///
/// Every stream gets its own message, opened with
/// [`MessageView::begin_message`] and addressed by the stream id afterwards.
/// Markup of earlier messages is never touched by later streams.
pub trait MessageView {
    /// Open an empty message for `stream_id` after the existing ones.
    fn begin_message(&mut self, stream_id: u64);
    /// Replace the markup of the message opened for `stream_id`.
    fn set_markup(&mut self, stream_id: u64, markup: &str);
    fn scroll_to_latest(&mut self);
}

/// Receives each completed assistant message exactly once.
pub trait HistorySink {
    fn commit(&mut self, message: Message);
}

/// Markup per stream id, in stream order.
impl MessageView for BTreeMap<u64, String> {
    fn begin_message(&mut self, stream_id: u64) {
        self.insert(stream_id, String::new());
    }

    fn set_markup(&mut self, stream_id: u64, markup: &str) {
        if let Some(slot) = self.get_mut(&stream_id) {
            slot.clear();
            slot.push_str(markup);
        }
    }

    fn scroll_to_latest(&mut self) {}
}

impl HistorySink for Vec<Message> {
    fn commit(&mut self, message: Message) {
        self.push(message);
    }
}

/// Turns displayed or completed text into markup for a view.
///
/// Holds no parse state: every call rebuilds segments from the text it is
/// given.
#[derive(Debug)]
pub struct Orchestrator<V, H> {
    view: V,
    history: H,
    options: RenderOptions,
}

impl<V: MessageView, H: HistorySink> Orchestrator<V, H> {
    pub fn new(view: V, history: H, options: RenderOptions) -> Self {
        Self {
            view,
            history,
            options,
        }
    }

    /// Open the view message that the stream's later renders replace.
    pub fn on_start(&mut self, stream_id: u64) {
        self.view.begin_message(stream_id);
        self.view.scroll_to_latest();
    }

    /// Re-render the cumulative displayed text after a typewriter tick.
    pub fn on_displayed(&mut self, stream_id: u64, displayed: &str) {
        let plan = build_segments(displayed);
        let markup = render_plan(&plan, RenderMode::Streaming, &self.options);
        self.show(stream_id, &markup);
    }

    /// Render the finished message in full and commit it to history.
    pub fn on_complete(&mut self, stream_id: u64, text: &str) {
        let plan = build_segments(text);
        let markup = render_plan(&plan, RenderMode::Final, &self.options);
        self.show(stream_id, &markup);
        self.history.commit(Message::assistant(text));
    }

    /// Replace the stream's message with the rendered error. Nothing is
    /// committed.
    pub fn on_error(&mut self, stream_id: u64, message: &str) {
        warn!(stream_id, error = message, "assistant stream failed");
        let markup = render_stream_error(message, &self.options);
        self.show(stream_id, &markup);
    }

    fn show(&mut self, stream_id: u64, markup: &str) {
        self.view.set_markup(stream_id, markup);
        self.view.scroll_to_latest();
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn into_parts(self) -> (V, H) {
        (self.view, self.history)
    }
}
