//! Per-connection session state machine
//!
//! A [`Session`] owns one connection from accept to teardown:
//!
//! ```text
//! AwaitInit ──handshake ok──▶ Streaming ──final chunk + done──▶ Done
//!     │                          │  ▲
//!     │                          └──┘ non-final chunk
//!     ├──protocol error──▶ Error ◀──render error── Streaming
//!     └──peer gone───────▶ Closed ◀──disconnect / write failure── Streaming
//! ```
//!
//! Every transition happens inside [`Session::run`], which never returns an error:
//! failures are translated into the terminal state and reported on the
//! [`SessionOutcome`].

use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::StreamConfig;
use crate::handshake::{SessionHandshake, SessionParams};
use crate::renderer::FrameRenderer;
use crate::scheduler::ChunkScheduler;
use crate::transport::{DisconnectWatch, MessageSink, MessageSource};
use crate::types::{Chunk, ServerMessage};
use crate::{ErrorKind, Result, SessionError};


/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the init message
    AwaitInit,
    /// Generating and sending chunks
    Streaming,
    /// Every frame and the done message were sent
    Done,
    /// Ended by a protocol or render error
    Error,
    /// Ended by the peer or a transport failure
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Error | SessionState::Closed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (AwaitInit, Streaming | Error | Closed) | (Streaming, Streaming | Done | Error | Closed)
        )
    }
}

/// Summary of a finished session
#[derive(Debug)]
pub struct SessionOutcome {
    pub id: Uuid,
    /// Terminal state reached
    pub state: SessionState,
    pub frames_sent: u64,
    pub chunks_sent: u64,
    /// Error that ended the session, if any
    pub error: Option<SessionError>,
}

/// One streaming session bound to one connection.
pub struct Session {
    id: Uuid,
    state: SessionState,
    config: Arc<StreamConfig>,
    renderer: Arc<dyn FrameRenderer>,
    frames_sent: u64,
    chunks_sent: u64,
}

impl Session {
    /// Create a session in `AwaitInit`
    pub fn new(config: Arc<StreamConfig>, renderer: Arc<dyn FrameRenderer>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::AwaitInit,
            config,
            renderer,
            frames_sent: 0,
            chunks_sent: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to a terminal state.
    pub async fn run<Src, Snk>(self, source: Src, sink: Snk) -> SessionOutcome
    where
        Src: MessageSource,
        Snk: MessageSink,
    {
        let span = info_span!("session", id = %self.id);
        self.drive(source, sink).instrument(span).await
    }

    async fn drive<Src, Snk>(mut self, mut source: Src, mut sink: Snk) -> SessionOutcome
    where
        Src: MessageSource,
        Snk: MessageSink,
    {
        info!("Session opened (renderer: {})", self.renderer.name());

        let params = match self.await_init(&mut source).await {
            Ok(params) => params,
            Err(e) => return self.terminate(&mut sink, e, false).await,
        };
        self.transition(SessionState::Streaming);
        info!(
            "Streaming {} frames: {} prompts, switches {:?}, {} frames/chunk",
            params.total_frames,
            params.plan.segment_count(),
            params.plan.switch_frame_indices(),
            params.chunk_frames()
        );

        // The source is only drained for disconnects from here on
        let watch = DisconnectWatch::spawn(source);
        let streamed = self.stream(params, &watch, &mut sink).await;

        match streamed {
            Ok(()) => self.complete(&mut sink).await,
            Err(e) => {
                let peer_gone = watch.is_disconnected();
                self.terminate(&mut sink, e, peer_gone).await
            }
        }
    }

    async fn await_init<Src: MessageSource>(&mut self, source: &mut Src) -> Result<SessionParams> {
        let timeout = self.config.init_timeout();
        let text = match tokio::time::timeout(timeout, source.next_message()).await {
            Ok(received) => received?.ok_or(SessionError::Disconnected)?,
            Err(_) => return Err(SessionError::timeout("waiting for init message", timeout)),
        };
        SessionHandshake::parse(&text, &self.config)
    }

    async fn stream<Snk: MessageSink>(
        &mut self,
        params: SessionParams,
        watch: &DisconnectWatch,
        sink: &mut Snk,
    ) -> Result<()> {
        let mut scheduler =
            ChunkScheduler::new(params, Arc::clone(&self.renderer), self.config.block_latency())
                .with_cancellation(watch.token());

        while let Some(chunk) = scheduler.next_chunk().await? {
            self.send_chunk(&chunk, sink).await?;
            if !chunk.is_final {
                self.transition(SessionState::Streaming);
            }
        }
        Ok(())
    }

    async fn send_chunk<Snk: MessageSink>(&mut self, chunk: &Chunk, sink: &mut Snk) -> Result<()> {
        for frame in &chunk.frames {
            sink.send(&ServerMessage::frame(frame)).await?;
            self.frames_sent += 1;
        }
        self.chunks_sent += 1;
        debug!(
            "Chunk {}: sent {} frames, total: {}",
            chunk.index,
            chunk.len(),
            self.frames_sent
        );
        Ok(())
    }

    async fn complete<Snk: MessageSink>(mut self, sink: &mut Snk) -> SessionOutcome {
        if let Err(e) = sink.send(&ServerMessage::done(self.frames_sent)).await {
            return self.terminate(sink, e, false).await;
        }
        self.transition(SessionState::Done);
        if let Err(e) = sink.close().await {
            debug!("Close after done failed: {}", e);
        }

        info!("Generation complete: {} frames in {} chunks", self.frames_sent, self.chunks_sent);
        self.outcome(None)
    }

    /// Translate a failure into a terminal state.
    ///
    /// Protocol and render errors are reported to the client unless the peer has
    /// already gone, in which case the session closes like any other disconnect.
    async fn terminate<Snk: MessageSink>(
        mut self,
        sink: &mut Snk,
        e: SessionError,
        peer_gone: bool,
    ) -> SessionOutcome {
        if e.is_reportable() && !peer_gone {
            if e.kind() == ErrorKind::Protocol {
                warn!("Rejecting session: {}", e);
            } else {
                error!("Session failed after {} frames: {}", self.frames_sent, e);
            }
            if let Err(send_err) = sink.send(&ServerMessage::error(e.to_string())).await {
                debug!("Could not report error to client: {}", send_err);
            } else if let Err(close_err) = sink.close().await {
                debug!("Close after error failed: {}", close_err);
            }
            self.transition(SessionState::Error);
        } else {
            if e.is_reportable() {
                info!("Client gone after {} frames, not reporting: {}", self.frames_sent, e);
            } else if matches!(e, SessionError::Disconnected) {
                info!("Client disconnected after {} frames", self.frames_sent);
            } else {
                warn!("Connection lost after {} frames: {}", self.frames_sent, e);
            }
            self.transition(SessionState::Closed);
        }
        self.outcome(Some(e))
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!("Ignoring invalid transition {:?} -> {:?}", self.state, next);
            return;
        }
        if self.state != next {
            debug!("{:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    fn outcome(self, error: Option<SessionError>) -> SessionOutcome {
        debug_assert!(self.state.is_terminal(), "session ended in {:?}", self.state);
        SessionOutcome {
            id: self.id,
            state: self.state,
            frames_sent: self.frames_sent,
            chunks_sent: self.chunks_sent,
            error,
        }
    }
}
