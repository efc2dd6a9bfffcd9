use tokio_util::sync::CancellationToken;

use super::typewriter::{PacingConfig, Typewriter};

/// Transport-side events for one assistant stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    End,
    Error(String),
}

/// State owned by one in-flight assistant stream.
///
/// Created when the stream starts and dropped once it completes, fails, or
/// is superseded by a newer stream. The `id` is the generation counter used
/// to discard events that belong to an abandoned stream, and it names the
/// view message this stream renders into. Once the session is gone nothing
/// writes to that message again.
#[derive(Debug)]
pub struct StreamSession {
    id: u64,
    typewriter: Typewriter,
    cancel_token: CancellationToken,
}

impl StreamSession {
    pub fn new(id: u64, pacing: PacingConfig, cancel_token: CancellationToken) -> Self {
        Self {
            id,
            typewriter: Typewriter::new(pacing),
            cancel_token,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn typewriter(&self) -> &Typewriter {
        &self.typewriter
    }

    pub fn typewriter_mut(&mut self) -> &mut Typewriter {
        &mut self.typewriter
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Stop pacing and tell the transport to give up on this stream.
    pub fn cancel(&mut self) {
        self.typewriter.stop();
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::typewriter::Step;

    #[test]
    fn cancel_stops_typewriter_and_token() {
        let token = CancellationToken::new();
        let mut session = StreamSession::new(7, PacingConfig::default(), token.clone());
        session.typewriter_mut().enqueue("hello");
        session.cancel();

        assert!(token.is_cancelled());
        assert!(session.is_cancelled());
        assert_eq!(session.typewriter_mut().step(), Step::Idle);
        assert_eq!(session.id(), 7);
    }
}
