//! Session coordinator
//!
//! One coordinator drives one streaming connection. A reader task pumps
//! frames into a channel; the coordinator's loop selects over those frames,
//! turn results and the session deadline, so every state transition and
//! every socket write happens on this loop alone. Turn tasks never touch the
//! socket: they report back over a channel.

use std::fmt::Display;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ControlMessage, EndOfSpeech, InboundFrame, OutboundMessage, Session, SessionState};
use crate::config::SessionConfig;
use crate::voice::{TurnError, TurnProcessor};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The wall-clock limit was reached and the client was notified
    Timeout,
    /// The client closed the connection
    ClientClosed,
    /// Reading from the socket failed
    ReadError(String),
    /// Writing to the socket failed
    WriteError(String),
}

/// Events produced by the reader task
enum ReaderEvent {
    Frame(InboundFrame),
    Failed(String),
    Ended,
}

/// Result of one turn task
struct TurnCompletion {
    turn: u64,
    result: Result<Vec<u8>, TurnError>,
}

/// Drives one conversation over a message sink and a frame stream
pub struct SessionCoordinator<W> {
    session: Session,
    sink: W,
    processor: TurnProcessor,
    config: SessionConfig,
    cancel: CancellationToken,
    turn_tx: mpsc::Sender<TurnCompletion>,
    turn_rx: mpsc::Receiver<TurnCompletion>,
    turn_task: Option<JoinHandle<()>>,
}

impl<W> SessionCoordinator<W>
where
    W: Sink<OutboundMessage> + Unpin,
    W::Error: Display,
{
    /// Open a session; its deadline starts now
    #[must_use]
    pub fn new(sink: W, processor: TurnProcessor, config: SessionConfig) -> Self {
        let (turn_tx, turn_rx) = mpsc::channel(1);
        Self {
            session: Session::new(config.timeout, config.max_buffer_bytes),
            sink,
            processor,
            config,
            cancel: CancellationToken::new(),
            turn_tx,
            turn_rx,
            turn_task: None,
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// Token cancelled when the session ends; every provider call observes it
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the session until timeout, disconnect or a socket failure
    pub async fn run<S, E>(mut self, frames: S) -> SessionEnd
    where
        S: Stream<Item = Result<InboundFrame, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
    {
        let session_id = self.session.id();
        // Provider calls stop even if this future is dropped mid-session
        let _cancel_on_drop = self.cancel.clone().drop_guard();
        tracing::info!(
            session_id = %session_id,
            timeout = ?self.config.timeout,
            "conversation session opened"
        );

        let (frame_tx, mut frame_rx) = mpsc::channel(32);
        let reader = tokio::spawn(read_frames(frames, frame_tx));

        let deadline = tokio::time::sleep_until(self.session.deadline());
        tokio::pin!(deadline);

        let end = loop {
            tokio::select! {
                biased;

                () = &mut deadline => break self.close_on_timeout().await,

                Some(done) = self.turn_rx.recv() => {
                    if let Err(end) = self.on_turn_complete(done).await {
                        break end;
                    }
                }

                event = frame_rx.recv() => match event {
                    Some(ReaderEvent::Frame(frame)) => {
                        if let Err(end) = self.on_frame(frame).await {
                            break end;
                        }
                    }
                    Some(ReaderEvent::Failed(error)) => {
                        tracing::warn!(session_id = %session_id, error = %error, "read error");
                        break SessionEnd::ReadError(error);
                    }
                    Some(ReaderEvent::Ended) | None => {
                        tracing::info!(session_id = %session_id, "connection closed by client");
                        break SessionEnd::ClientClosed;
                    }
                },
            }
        };

        self.cancel.cancel();
        reader.abort();
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        self.session.close();

        tracing::info!(
            session_id = %session_id,
            end = ?end,
            turns = self.session.turns(),
            dropped_bytes = self.session.dropped_bytes(),
            elapsed = ?self.session.elapsed(),
            "conversation session closed"
        );

        end
    }

    async fn on_frame(&mut self, frame: InboundFrame) -> Result<(), SessionEnd> {
        match frame {
            InboundFrame::Audio(chunk) => {
                if !self.session.push_audio(&chunk)
                    && matches!(
                        self.session.state(),
                        SessionState::Active | SessionState::Processing
                    )
                {
                    tracing::warn!(
                        session_id = %self.session.id(),
                        chunk_bytes = chunk.len(),
                        buffered = self.session.buffered_bytes(),
                        "audio buffer full, dropping chunk"
                    );
                }
                Ok(())
            }
            InboundFrame::Text(text) => match ControlMessage::parse(&text) {
                Some(ControlMessage::EndOfSpeech) => self.on_end_of_speech().await,
                Some(ControlMessage::Unknown) | None => {
                    tracing::debug!(session_id = %self.session.id(), "ignoring unrecognized text frame");
                    Ok(())
                }
            },
            InboundFrame::Close => Err(SessionEnd::ClientClosed),
        }
    }

    async fn on_end_of_speech(&mut self) -> Result<(), SessionEnd> {
        match self.session.end_of_speech() {
            EndOfSpeech::Start { turn, audio } => {
                tracing::info!(
                    session_id = %self.session.id(),
                    turn,
                    audio_bytes = audio.len(),
                    "end of speech received, processing turn"
                );
                self.write(OutboundMessage::Processing).await?;
                self.spawn_turn(turn, audio);
                Ok(())
            }
            EndOfSpeech::EmptyBuffer => {
                tracing::info!(session_id = %self.session.id(), "end of speech with no audio, skipping");
                Ok(())
            }
            EndOfSpeech::AlreadyProcessing => {
                tracing::debug!(session_id = %self.session.id(), "turn already in flight, dropping end of speech");
                Ok(())
            }
            EndOfSpeech::Ignored => Ok(()),
        }
    }

    fn spawn_turn(&mut self, turn: u64, audio: Vec<u8>) {
        let processor = self.processor.clone();
        let cancel = self.cancel.clone();
        let done = self.turn_tx.clone();

        self.turn_task = Some(tokio::spawn(async move {
            let result = processor.process(&audio, &cancel).await;
            // The receiver only disappears once the session has ended
            let _ = done.send(TurnCompletion { turn, result }).await;
        }));
    }

    async fn on_turn_complete(&mut self, done: TurnCompletion) -> Result<(), SessionEnd> {
        self.turn_task = None;
        let session_id = self.session.id();

        match done.result {
            Ok(audio) => {
                tracing::info!(
                    session_id = %session_id,
                    turn = done.turn,
                    audio_bytes = audio.len(),
                    "sending reply audio"
                );
                self.write(OutboundMessage::Audio(audio)).await?;
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(session_id = %session_id, turn = done.turn, "turn cancelled");
            }
            Err(e) if e.is_soft() => {
                tracing::info!(session_id = %session_id, turn = done.turn, reason = %e, "turn abandoned");
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    turn = done.turn,
                    error = %e,
                    "turn failed, continuing to listen"
                );
            }
        }

        self.session.finish_turn();
        Ok(())
    }

    async fn close_on_timeout(&mut self) -> SessionEnd {
        self.session.begin_close();
        self.cancel.cancel();
        tracing::info!(session_id = %self.session.id(), "conversation timeout reached, closing connection");

        let notice = OutboundMessage::End {
            reason: self.config.timeout_reason(),
        };
        let limit = self.config.close_write_timeout;

        match tokio::time::timeout(limit, self.sink.send(notice)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to send timeout notice"),
            Err(_) => tracing::warn!(limit = ?limit, "timed out sending timeout notice"),
        }

        if let Ok(Err(e)) = tokio::time::timeout(limit, self.sink.close()).await {
            tracing::debug!(error = %e, "failed to close connection cleanly");
        }

        SessionEnd::Timeout
    }

    /// Write on the main loop; a client that stops reading cannot outlive the deadline
    async fn write(&mut self, message: OutboundMessage) -> Result<(), SessionEnd> {
        let deadline = self.session.deadline();
        match tokio::time::timeout_at(deadline, self.sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!(session_id = %self.session.id(), error = %e, "write error");
                Err(SessionEnd::WriteError(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(session_id = %self.session.id(), "write still pending at deadline");
                Err(self.close_on_timeout().await)
            }
        }
    }
}

/// Reader task: forwards frames until the stream ends, errors or the client closes
async fn read_frames<S, E>(mut frames: S, events: mpsc::Sender<ReaderEvent>)
where
    S: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: Display,
{
    while let Some(next) = frames.next().await {
        let event = match next {
            Ok(InboundFrame::Close) => ReaderEvent::Ended,
            Ok(frame) => ReaderEvent::Frame(frame),
            Err(e) => ReaderEvent::Failed(e.to_string()),
        };

        let last = !matches!(event, ReaderEvent::Frame(_));
        if events.send(event).await.is_err() || last {
            return;
        }
    }

    let _ = events.send(ReaderEvent::Ended).await;
}
