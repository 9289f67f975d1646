//! Conversation sessions
//!
//! A [`Session`] is the in-memory state of one streaming connection. It is
//! owned by a single [`SessionCoordinator`] for the connection's lifetime and
//! is never persisted.

mod coordinator;
mod protocol;

use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

pub use coordinator::{SessionCoordinator, SessionEnd};
pub use protocol::{ControlMessage, InboundFrame, OutboundMessage, WireFrame};

/// Deadline used when the configured timeout does not fit in an `Instant` (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Listening; audio accumulates and end-of-speech starts a turn
    Active,
    /// A turn is in flight; audio still accumulates for the next one
    Processing,
    /// Timeout notice is being written
    Closing,
    /// Terminal
    Closed,
}

/// Result of an end-of-speech signal
#[derive(Debug, PartialEq, Eq)]
pub enum EndOfSpeech {
    /// Nothing buffered; no state change
    EmptyBuffer,
    /// A turn is already running; the signal is dropped
    AlreadyProcessing,
    /// Session is closing or closed
    Ignored,
    /// Start a turn on this audio snapshot
    Start { turn: u64, audio: Vec<u8> },
}

/// In-memory state of one conversation
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    opened_at: Instant,
    deadline: Instant,
    state: SessionState,
    buffer: Vec<u8>,
    max_buffer_bytes: usize,
    turns: u64,
    dropped_bytes: usize,
}

impl Session {
    /// Open a session whose deadline is `timeout` from now
    #[must_use]
    pub fn new(timeout: Duration, max_buffer_bytes: usize) -> Self {
        let opened_at = Instant::now();
        Self {
            id: Uuid::new_v4(),
            opened_at,
            deadline: opened_at
                .checked_add(timeout)
                .unwrap_or_else(|| opened_at + FAR_FUTURE),
            state: SessionState::Active,
            buffer: Vec::new(),
            max_buffer_bytes,
            turns: 0,
            dropped_bytes: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time since the connection opened
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Bytes waiting for the next turn
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Turns started so far
    #[must_use]
    pub const fn turns(&self) -> u64 {
        self.turns
    }

    /// Audio discarded because the buffer bound was reached
    #[must_use]
    pub const fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    /// Append an audio chunk
    ///
    /// Returns `false` if the chunk was discarded, either because the session
    /// is shutting down or because it would overflow the buffer bound.
    pub fn push_audio(&mut self, chunk: &[u8]) -> bool {
        if !matches!(self.state, SessionState::Active | SessionState::Processing) {
            return false;
        }

        if self.buffer.len().saturating_add(chunk.len()) > self.max_buffer_bytes {
            self.dropped_bytes = self.dropped_bytes.saturating_add(chunk.len());
            return false;
        }

        self.buffer.extend_from_slice(chunk);
        true
    }

    /// Handle an end-of-speech signal
    ///
    /// On `Start` the session is `Processing` and the buffer has been cleared
    /// so audio for the next turn can accumulate.
    pub fn end_of_speech(&mut self) -> EndOfSpeech {
        match self.state {
            SessionState::Processing => EndOfSpeech::AlreadyProcessing,
            SessionState::Closing | SessionState::Closed => EndOfSpeech::Ignored,
            SessionState::Active if self.buffer.is_empty() => EndOfSpeech::EmptyBuffer,
            SessionState::Active => {
                self.state = SessionState::Processing;
                self.turns += 1;
                EndOfSpeech::Start {
                    turn: self.turns,
                    audio: std::mem::take(&mut self.buffer),
                }
            }
        }
    }

    /// The in-flight turn finished (successfully or not)
    pub fn finish_turn(&mut self) {
        if self.state == SessionState::Processing {
            self.state = SessionState::Active;
        }
    }

    /// Deadline reached; the timeout notice is about to be written
    pub fn begin_close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closing;
        }
    }

    /// Terminal transition; releases buffered audio
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.buffer = Vec::new();
    }
}
