//! The pacing loop as a single tokio task.
//!
//! [`spawn_driver`] starts an actor that owns the active [`StreamSession`] and
//! the [`Orchestrator`]. Transport code talks to it through a cloneable
//! [`StreamHandle`]; nothing outside the task ever touches the queue or the
//! displayed text. Timer sleeps are the only suspension points, and every
//! parse and render runs to completion inside the task.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::orchestrator::{HistorySink, MessageView, Orchestrator};
use super::session::{StreamEvent, StreamSession};
use super::typewriter::PacingConfig;

/// Snapshot of the driver published after every state change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriverStatus {
    /// Stream currently owned by the driver, if any.
    pub active_stream: Option<u64>,
    /// Highest stream id that completed, failed or was superseded.
    pub settled_through: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverClosed;

impl fmt::Display for DriverClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream driver has shut down")
    }
}

impl std::error::Error for DriverClosed {}

#[derive(Debug)]
enum Command {
    Start {
        id: u64,
        cancel_token: CancellationToken,
    },
    Event {
        id: u64,
        event: StreamEvent,
    },
    Shutdown,
}

/// Request side of the driver actor.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<DriverStatus>,
    last_id: Arc<AtomicU64>,
}

impl StreamHandle {
    /// Begin a new stream, superseding whatever stream is in flight.
    ///
    /// The returned token is cancelled when this stream is superseded or the
    /// driver shuts down; transports should stop reading when it fires.
    pub fn start_stream(&self) -> (u64, CancellationToken) {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel_token = CancellationToken::new();
        if self
            .command_tx
            .send(Command::Start {
                id,
                cancel_token: cancel_token.clone(),
            })
            .is_err()
        {
            cancel_token.cancel();
        }
        (id, cancel_token)
    }

    /// Deliver a transport event. Returns `false` once the driver is gone.
    pub fn send(&self, stream_id: u64, event: StreamEvent) -> bool {
        self.command_tx
            .send(Command::Event {
                id: stream_id,
                event,
            })
            .is_ok()
    }

    pub fn on_chunk(&self, stream_id: u64, chunk: impl Into<String>) -> bool {
        self.send(stream_id, StreamEvent::Chunk(chunk.into()))
    }

    pub fn on_end(&self, stream_id: u64) -> bool {
        self.send(stream_id, StreamEvent::End)
    }

    pub fn on_error(&self, stream_id: u64, message: impl Into<String>) -> bool {
        self.send(stream_id, StreamEvent::Error(message.into()))
    }

    /// Wait until the most recently started stream has been fully displayed
    /// and committed, has failed, or has been superseded.
    pub async fn await_drain(&self) -> Result<(), DriverClosed> {
        let target = self.last_id.load(Ordering::SeqCst);
        let mut status_rx = self.status_rx.clone();
        status_rx
            .wait_for(|status| status.settled_through >= target)
            .await
            .map(|_| ())
            .map_err(|_| DriverClosed)
    }

    pub fn status(&self) -> DriverStatus {
        self.status_rx.borrow().clone()
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown);
    }
}

/// Spawn the driver task. The join handle yields the orchestrator back once
/// [`StreamHandle::shutdown`] is called or every handle is dropped.
pub fn spawn_driver<V, H>(
    orchestrator: Orchestrator<V, H>,
    pacing: PacingConfig,
) -> (StreamHandle, JoinHandle<Orchestrator<V, H>>)
where
    V: MessageView + Send + 'static,
    H: HistorySink + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(DriverStatus::default());
    let driver = Driver {
        commands: command_rx,
        status_tx,
        orchestrator,
        pacing,
        session: None,
        latest_id: 0,
        next_tick: None,
    };
    let join = tokio::spawn(driver.run());
    let handle = StreamHandle {
        command_tx,
        status_rx,
        last_id: Arc::new(AtomicU64::new(0)),
    };
    (handle, join)
}

struct Driver<V, H> {
    commands: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<DriverStatus>,
    orchestrator: Orchestrator<V, H>,
    pacing: PacingConfig,
    session: Option<StreamSession>,
    latest_id: u64,
    next_tick: Option<Instant>,
}

impl<V: MessageView, H: HistorySink> Driver<V, H> {
    async fn run(mut self) -> Orchestrator<V, H> {
        loop {
            let deadline = time::sleep_until(self.next_tick.unwrap_or_else(Instant::now));
            tokio::pin!(deadline);

            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle(command),
                    }
                }
                _ = &mut deadline, if self.next_tick.is_some() => self.tick(),
            }
        }

        if let Some(mut session) = self.session.take() {
            debug!(stream_id = session.id(), "driver shutting down with active stream");
            session.cancel();
        }
        self.orchestrator
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { id, cancel_token } => self.start(id, cancel_token),
            Command::Event { id, event } => self.on_event(id, event),
            Command::Shutdown => {}
        }
    }

    fn start(&mut self, id: u64, cancel_token: CancellationToken) {
        if id <= self.latest_id {
            debug!(stream_id = id, latest = self.latest_id, "ignoring out-of-order stream start");
            cancel_token.cancel();
            return;
        }
        self.latest_id = id;

        if let Some(mut previous) = self.session.take() {
            debug!(
                stream_id = previous.id(),
                superseded_by = id,
                "superseding active stream"
            );
            previous.cancel();
            self.settle(previous.id());
        }

        self.session = Some(StreamSession::new(id, self.pacing.clone(), cancel_token));
        self.orchestrator.on_start(id);
        self.next_tick = None;
        self.status_tx
            .send_modify(|status| status.active_stream = Some(id));
        debug!(stream_id = id, "stream started");
    }

    fn on_event(&mut self, id: u64, event: StreamEvent) {
        let Some(session) = self.session.as_mut().filter(|s| s.id() == id) else {
            debug!(stream_id = id, "dropping event for inactive stream");
            return;
        };

        match event {
            StreamEvent::Chunk(text) => {
                if session.typewriter().generation_ended() {
                    debug!(stream_id = id, "dropping chunk after stream end");
                    return;
                }
                if session.typewriter_mut().enqueue(&text) {
                    self.next_tick = Some(Instant::now());
                }
            }
            StreamEvent::End => {
                session.typewriter_mut().mark_generation_ended();
                if self.next_tick.is_none() {
                    self.next_tick = Some(Instant::now());
                }
            }
            StreamEvent::Error(message) => {
                session.typewriter_mut().stop();
                self.orchestrator.on_error(id, &message);
                self.session = None;
                self.next_tick = None;
                self.settle(id);
            }
        }
    }

    fn tick(&mut self) {
        self.next_tick = None;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let step = session.typewriter_mut().step();
        if step.revealed_text() {
            self.orchestrator
                .on_displayed(session.id(), session.typewriter().displayed());
        }
        if let Some(delay) = step.next_delay() {
            self.next_tick = Some(Instant::now() + delay);
            return;
        }
        if !session.typewriter().is_drained() {
            return;
        }

        if let Some(session) = self.session.take() {
            let id = session.id();
            self.orchestrator.on_complete(id, session.typewriter().displayed());
            self.settle(id);
            debug!(stream_id = id, "stream completed");
        }
    }

    fn settle(&mut self, id: u64) {
        self.status_tx.send_modify(|status| {
            status.settled_through = status.settled_through.max(id);
            if status.active_stream == Some(id) {
                status.active_stream = None;
            }
        });
    }
}
