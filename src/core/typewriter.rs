//! Typewriter pacing for streamed assistant text.
//!
//! [`Typewriter`] is a pure state machine: the caller enqueues chunks as they
//! arrive and calls [`Typewriter::step`] whenever the previous step's delay
//! has elapsed. Each step reveals at most one grapheme, so the displayed text
//! is always a prefix of everything received.

use std::time::Duration;

use unicode_segmentation::UnicodeSegmentation;

/// Timing knobs for the typewriter loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    /// Delay between characters when nothing special applies.
    pub base_delay: Duration,
    /// Delay used to catch up with a backlog or flush after generation ends.
    pub fast_delay: Duration,
    /// Delay used when the queue is nearly empty but generation continues.
    pub slow_delay: Duration,
    /// Re-check interval while buffering.
    pub buffer_delay: Duration,
    /// Minimum queued characters before the first reveal.
    pub buffer_threshold: usize,
    /// After generation ends, a queue shorter than this is revealed at once.
    pub flush_threshold: usize,
    pub backlog_threshold: usize,
    pub starve_threshold: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(50),
            fast_delay: Duration::from_millis(10),
            slow_delay: Duration::from_millis(100),
            buffer_delay: Duration::from_millis(100),
            buffer_threshold: 0,
            flush_threshold: 30,
            backlog_threshold: 50,
            starve_threshold: 10,
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The loop terminated without revealing anything.
    Idle,
    /// Still buffering; check again after the delay without consuming.
    Wait(Duration),
    /// Reveal attempt made; `emitted` is false when the queue was empty.
    Advance { emitted: bool, delay: Duration },
    /// The short remainder was revealed at once and the loop terminated.
    Flush,
}

impl Step {
    pub fn next_delay(self) -> Option<Duration> {
        match self {
            Step::Wait(delay) | Step::Advance { delay, .. } => Some(delay),
            Step::Idle | Step::Flush => None,
        }
    }

    pub fn revealed_text(self) -> bool {
        matches!(self, Step::Flush | Step::Advance { emitted: true, .. })
    }
}

#[derive(Debug, Default)]
pub struct Typewriter {
    config: PacingConfig,
    queue: String,
    /// Grapheme count of `queue`, kept in step with every push and drain.
    queued_graphemes: usize,
    displayed: String,
    active: bool,
    buffering: bool,
    generation_ended: bool,
    stopped: bool,
}

impl Typewriter {
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Append a chunk to the pending queue.
    ///
    /// Returns `true` when the loop was idle and the caller must schedule a
    /// step right away.
    pub fn enqueue(&mut self, text: &str) -> bool {
        self.queued_graphemes += self.graphemes_added_by(text);
        self.queue.push_str(text);
        if self.active || self.stopped {
            return false;
        }
        self.active = true;
        self.buffering = true;
        true
    }

    pub fn mark_generation_ended(&mut self) {
        self.generation_ended = true;
    }

    /// Halt the loop; every later step returns [`Step::Idle`].
    pub fn stop(&mut self) {
        self.stopped = true;
        self.active = false;
    }

    pub fn step(&mut self) -> Step {
        if self.stopped {
            self.active = false;
            return Step::Idle;
        }

        let pending = self.pending_len();
        if self.generation_ended && pending == 0 {
            self.terminate();
            return Step::Idle;
        }

        if self.generation_ended && pending < self.config.flush_threshold {
            let rest = std::mem::take(&mut self.queue);
            self.queued_graphemes = 0;
            self.displayed.push_str(&rest);
            self.terminate();
            return Step::Flush;
        }

        if self.buffering && pending < self.config.buffer_threshold && !self.generation_ended {
            return Step::Wait(self.config.buffer_delay);
        }
        self.buffering = false;

        let emitted = self.reveal_one();
        Step::Advance {
            emitted,
            delay: self.next_delay(),
        }
    }

    fn reveal_one(&mut self) -> bool {
        let Some(len) = self.queue.graphemes(true).next().map(str::len) else {
            return false;
        };
        self.displayed.extend(self.queue.drain(..len));
        self.queued_graphemes = if self.queue.is_empty() {
            0
        } else {
            self.queued_graphemes.saturating_sub(1)
        };
        true
    }

    /// Graphemes `text` adds to the queue. A chunk may extend the queue's
    /// last cluster (`✏` followed by U+FE0F), so the tail is recounted with it.
    fn graphemes_added_by(&self, text: &str) -> usize {
        match self.queue.graphemes(true).next_back() {
            Some(tail) => {
                let mut joined = String::with_capacity(tail.len() + text.len());
                joined.push_str(tail);
                joined.push_str(text);
                joined.graphemes(true).count() - 1
            }
            None => text.graphemes(true).count(),
        }
    }

    fn next_delay(&self) -> Duration {
        let remaining = self.pending_len();
        if remaining > self.config.backlog_threshold {
            self.config.fast_delay
        } else if remaining < self.config.starve_threshold && !self.generation_ended {
            self.config.slow_delay
        } else if self.generation_ended {
            self.config.fast_delay
        } else {
            self.config.base_delay
        }
    }

    fn terminate(&mut self) {
        self.active = false;
        self.buffering = false;
    }

    pub fn displayed(&self) -> &str {
        &self.displayed
    }

    pub fn pending(&self) -> &str {
        &self.queue
    }

    /// Queued graphemes not yet revealed.
    pub fn pending_len(&self) -> usize {
        self.queued_graphemes
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn generation_ended(&self) -> bool {
        self.generation_ended
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Queue empty and no more input expected.
    pub fn is_drained(&self) -> bool {
        self.generation_ended && self.queue.is_empty()
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typewriter_with(text: &str) -> Typewriter {
        let mut tw = Typewriter::new(PacingConfig::default());
        assert!(tw.enqueue(text));
        tw
    }

    #[test]
    fn backlog_uses_fast_delay() {
        let mut tw = typewriter_with(&"x".repeat(60));
        let step = tw.step();
        assert_eq!(
            step,
            Step::Advance {
                emitted: true,
                delay: PacingConfig::default().fast_delay
            }
        );
        assert_eq!(tw.displayed(), "x");
        assert_eq!(tw.pending_len(), 59);
    }

    #[test]
    fn short_queue_during_generation_uses_slow_delay() {
        let mut tw = typewriter_with("abcde");
        assert_eq!(
            tw.step(),
            Step::Advance {
                emitted: true,
                delay: PacingConfig::default().slow_delay
            }
        );
    }

    #[test]
    fn medium_queue_uses_base_delay() {
        let mut tw = typewriter_with(&"y".repeat(20));
        assert_eq!(tw.step().next_delay(), Some(PacingConfig::default().base_delay));
    }

    #[test]
    fn ended_generation_flushes_short_remainder_in_one_step() {
        let mut tw = typewriter_with("0123456789");
        tw.mark_generation_ended();
        assert_eq!(tw.step(), Step::Flush);
        assert_eq!(tw.displayed(), "0123456789");
        assert!(tw.is_drained());
        assert!(!tw.is_active());
        assert_eq!(tw.step(), Step::Idle);
    }

    #[test]
    fn ended_generation_with_long_queue_types_fast() {
        let mut tw = typewriter_with(&"z".repeat(40));
        tw.mark_generation_ended();
        assert_eq!(
            tw.step(),
            Step::Advance {
                emitted: true,
                delay: PacingConfig::default().fast_delay
            }
        );
    }

    #[test]
    fn buffering_waits_without_consuming() {
        let config = PacingConfig {
            buffer_threshold: 3,
            ..PacingConfig::default()
        };
        let mut tw = Typewriter::new(config.clone());
        assert!(tw.enqueue("a"));
        assert_eq!(tw.step(), Step::Wait(config.buffer_delay));
        assert_eq!(tw.displayed(), "");
        assert!(tw.is_buffering());

        assert!(!tw.enqueue("bcd"));
        assert!(tw.step().revealed_text());
        assert!(!tw.is_buffering());
        assert_eq!(tw.displayed(), "a");
    }

    #[test]
    fn empty_queue_while_generating_keeps_polling() {
        let mut tw = typewriter_with("a");
        assert!(tw.step().revealed_text());
        assert_eq!(
            tw.step(),
            Step::Advance {
                emitted: false,
                delay: PacingConfig::default().slow_delay
            }
        );
        assert!(tw.is_active());
    }

    #[test]
    fn stop_halts_the_loop() {
        let mut tw = typewriter_with("abc");
        tw.stop();
        assert_eq!(tw.step(), Step::Idle);
        assert!(!tw.enqueue("more"));
        assert_eq!(tw.displayed(), "");
    }

    #[test]
    fn graphemes_are_revealed_whole() {
        let mut tw = typewriter_with("✏️x");
        tw.step();
        assert_eq!(tw.displayed(), "✏️");
    }

    #[test]
    fn pending_len_tracks_graphemes_across_chunks() {
        let mut tw = typewriter_with("ab✏");
        assert_eq!(tw.pending_len(), 3);
        tw.enqueue("\u{FE0F}c");
        assert_eq!(tw.pending_len(), 4);
        assert_eq!(tw.pending_len(), tw.pending().graphemes(true).count());

        while tw.pending_len() > 0 {
            assert!(tw.step().revealed_text());
            assert_eq!(tw.pending_len(), tw.pending().graphemes(true).count());
        }
        assert_eq!(tw.displayed(), "ab✏️c");
    }

    #[test]
    fn large_backlog_counts_down_one_per_step() {
        let mut tw = typewriter_with(&"字".repeat(10_000));
        for remaining in (9_990..10_000).rev() {
            tw.step();
            assert_eq!(tw.pending_len(), remaining);
        }
        tw.mark_generation_ended();
        tw.enqueue("tail");
        assert_eq!(tw.pending_len(), 9_994);
    }

    #[test]
    fn displayed_is_always_a_prefix_of_received_text() {
        let chunks = ["## 思考", "过程：\n读", "取文件", "\n---\n## 回复：\n", "好的，**完成**。"];
        let mut tw = Typewriter::new(PacingConfig::default());
        let mut received = String::new();
        for chunk in chunks {
            tw.enqueue(chunk);
            received.push_str(chunk);
            for _ in 0..3 {
                tw.step();
                assert!(received.starts_with(tw.displayed()));
                assert_eq!(format!("{}{}", tw.displayed(), tw.pending()), received);
            }
        }
        tw.mark_generation_ended();
        while tw.step().next_delay().is_some() {
            assert!(received.starts_with(tw.displayed()));
        }
        assert_eq!(tw.displayed(), received);
    }
}
