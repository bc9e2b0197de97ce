//! One capture-and-relay session, activation to teardown.

use std::sync::Arc;

use tabcast_capture::{CaptureEvent, CapturePipeline, EncoderSettings};
use tabcast_core::{Error, RelayConfig};
use tabcast_mediator::Mediator;
use tabcast_protocol::{PageNotification, HANDSHAKE};
use tabcast_transport::{Connection, InboundMessage, TransportEvent};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::state::SessionState;

/// Final report for one session.
#[derive(Debug)]
pub struct SessionOutcome {
    pub id: String,
    pub state: SessionState,
    /// Every state visited, in order, starting at `Idle`.
    pub visited: Vec<SessionState>,
    pub chunks_sent: u64,
    pub started_at: String,
    pub error: Option<Error>,
}

/// Handle for observing and stopping a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    stop_tx: mpsc::Sender<()>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state, as last published by the session task.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Request a stop. Safe to invoke in any state, any number of times;
    /// the session drives itself to `Closed` deterministically.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(()).await;
    }

    /// Suspend until the session reaches a terminal state.
    pub async fn wait_terminal(&mut self) -> SessionState {
        while !self.state_rx.borrow().is_terminal() {
            if self.state_rx.changed().await.is_err() {
                break;
            }
        }
        *self.state_rx.borrow()
    }
}

/// One session. Created per activation; never reused after a terminal
/// state.
pub struct Session {
    id: String,
    config: RelayConfig,
    settings: EncoderSettings,
    mediator: Arc<Mediator>,
    pipeline: CapturePipeline,
    stop_rx: mpsc::Receiver<()>,
    state_tx: watch::Sender<SessionState>,
    state: SessionState,
    visited: Vec<SessionState>,
    started_at: String,
}

impl Session {
    pub fn new(
        config: RelayConfig,
        settings: EncoderSettings,
        mediator: Arc<Mediator>,
        pipeline: CapturePipeline,
    ) -> (Self, SessionHandle) {
        let id = uuid::Uuid::new_v4().to_string();
        let (stop_tx, stop_rx) = mpsc::channel(4);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let session = Self {
            id: id.clone(),
            config,
            settings,
            mediator,
            pipeline,
            stop_rx,
            state_tx,
            state: SessionState::Idle,
            visited: vec![SessionState::Idle],
            started_at: chrono::Utc::now().to_rfc3339(),
        };
        let handle = SessionHandle {
            id,
            stop_tx,
            state_rx,
        };
        (session, handle)
    }

    fn transition(&mut self, next: SessionState) {
        info!("session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        self.visited.push(next);
        let _ = self.state_tx.send(next);
    }

    fn outcome(self, chunks_sent: u64, error: Option<Error>) -> SessionOutcome {
        SessionOutcome {
            id: self.id,
            state: self.state,
            visited: self.visited,
            chunks_sent,
            started_at: self.started_at,
            error,
        }
    }

    /// Drive the session from activation to a terminal state. Consumes the
    /// session; a fresh activation builds a new instance.
    ///
    /// `port` comes from the activation message; inbound consumer messages
    /// are forwarded verbatim to `page`.
    pub async fn run(mut self, port: u16, page: mpsc::Sender<PageNotification>) -> SessionOutcome {
        let url = format!("ws://{}:{}", self.config.consumer_host, port);

        // Activation received: open the transport.
        self.transition(SessionState::Connecting);
        let (transport_tx, mut transport_events) = mpsc::channel::<TransportEvent>(64);
        let opened = tokio::select! {
            _ = self.stop_rx.recv() => None,
            res = Connection::open(&url, self.config.connect_timeout, transport_tx) => Some(res),
        };
        let mut conn = match opened {
            // Stopped before the connection existed; nothing to release.
            None => return self.close_early(None).await,
            Some(Err(e)) => {
                error!("session {}: transport open failed: {}", self.id, e);
                self.transition(SessionState::Failed);
                return self.outcome(0, Some(e));
            }
            Some(Ok(conn)) => conn,
        };

        // Handshake precedes every chunk.
        if let Err(e) = conn.send_text(HANDSHAKE).await {
            conn.close().await;
            self.transition(SessionState::Failed);
            return self.outcome(0, Some(e));
        }

        // Token round trip through the mediator, bounded.
        self.transition(SessionState::AwaitingToken);
        let token_timeout = self.config.token_timeout;
        let delivered = tokio::select! {
            _ = self.stop_rx.recv() => return self.close_early(Some(conn)).await,
            res = tokio::time::timeout(token_timeout, self.mediator.request_token()) => {
                match res {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::Timeout("token round trip")),
                }
            }
        };
        let (tab, token) = match delivered {
            Ok(pair) => pair,
            Err(e) => return self.fail_open(conn, e).await,
        };
        debug!("session {}: token issued for tab {}", self.id, tab);

        // The single-use token buys the stream.
        self.transition(SessionState::AcquiringStream);
        let acquire_timeout = self.config.acquire_timeout;
        let acquired = tokio::select! {
            _ = self.stop_rx.recv() => return self.close_early(Some(conn)).await,
            res = tokio::time::timeout(acquire_timeout, self.pipeline.acquire(token)) => {
                match res {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::Timeout("stream acquisition")),
                }
            }
        };
        let mut stream = match acquired {
            Ok(stream) => stream,
            Err(e) => return self.fail_open(conn, e).await,
        };

        // Stream live: start the encoder.
        self.transition(SessionState::Recording);
        let started = self.pipeline.start(&stream, &self.settings);
        let (mut encoder, mut capture_events) = match started {
            Ok(pair) => pair,
            Err(e) => {
                stream.release();
                return self.fail_open(conn, e).await;
            }
        };

        let mut chunks_sent: u64 = 0;
        let mut failure: Option<Error> = None;
        let mut encoder_stopped = false;
        loop {
            tokio::select! {
                _ = self.stop_rx.recv() => {
                    debug!("session {}: stop command", self.id);
                    break;
                }
                event = capture_events.recv() => match event {
                    Some(CaptureEvent::Chunk(chunk)) => {
                        // Zero-length chunks are dropped, never transmitted.
                        if chunk.is_empty() {
                            continue;
                        }
                        if let Err(e) = conn.send_chunk(chunk).await {
                            warn!("session {}: chunk send failed: {}", self.id, e);
                            failure = Some(e);
                            break;
                        }
                        chunks_sent += 1;
                    }
                    Some(CaptureEvent::EncoderError(reason)) => {
                        // Exactly one report, then teardown.
                        let report = format!("encoder error: {}", reason);
                        if let Err(e) = conn.send_text(&report).await {
                            debug!("session {}: error report not delivered: {}", self.id, e);
                        }
                        failure = Some(Error::Encoder(reason));
                        break;
                    }
                    Some(CaptureEvent::TracksRemoved) => {
                        // Normal termination trigger; no error report.
                        info!("session {}: tracks removed out of band", self.id);
                        break;
                    }
                    Some(CaptureEvent::EncoderStopped) | None => {
                        encoder_stopped = true;
                        break;
                    }
                },
                event = transport_events.recv() => match event {
                    Some(TransportEvent::Inbound(message)) => {
                        let payload = inbound_payload(message);
                        let _ = page
                            .send(PageNotification::Extension { message: payload })
                            .await;
                    }
                    Some(TransportEvent::Disconnected { reason }) => {
                        info!(
                            "session {}: consumer disconnected ({})",
                            self.id,
                            reason.as_deref().unwrap_or("closed")
                        );
                        break;
                    }
                    None => break,
                },
            }
        }

        // Graceful stop: drain trailing chunks until the encoder confirms.
        self.transition(SessionState::Stopping);
        encoder.stop();
        if !encoder_stopped {
            let drained = tokio::time::timeout(self.config.stop_timeout, async {
                while let Some(event) = capture_events.recv().await {
                    match event {
                        CaptureEvent::Chunk(chunk) => {
                            if chunk.is_empty() || conn.is_closed() {
                                continue;
                            }
                            if conn.send_chunk(chunk).await.is_ok() {
                                chunks_sent += 1;
                            }
                        }
                        CaptureEvent::EncoderStopped => break,
                        CaptureEvent::EncoderError(_) | CaptureEvent::TracksRemoved => {}
                    }
                }
            })
            .await;
            if drained.is_err() {
                warn!("session {}: encoder stop timed out, forcing teardown", self.id);
            }
        }

        // Release tracks, close the transport, exactly once each.
        stream.release();
        conn.close().await;
        self.transition(SessionState::Closed);
        info!("session {}: closed after {} chunks", self.id, chunks_sent);
        self.outcome(chunks_sent, failure)
    }

    /// Explicit stop before recording began: nothing to release beyond the
    /// transport, if it exists yet.
    async fn close_early(mut self, conn: Option<Connection>) -> SessionOutcome {
        self.transition(SessionState::Stopping);
        if let Some(mut conn) = conn {
            conn.close().await;
        }
        self.transition(SessionState::Closed);
        self.outcome(0, None)
    }

    /// Setup failure with the transport open: report best-effort, close,
    /// terminate.
    async fn fail_open(mut self, mut conn: Connection, error: Error) -> SessionOutcome {
        error!("session {}: {}", self.id, error);
        let report = format!("capture error: {}", error);
        if let Err(e) = conn.send_text(&report).await {
            debug!("session {}: failure report not delivered: {}", self.id, e);
        }
        conn.close().await;
        self.transition(SessionState::Failed);
        self.outcome(0, Some(error))
    }
}

/// Inbound payloads are forwarded verbatim: text as a JSON string, binary
/// as a byte array.
fn inbound_payload(message: InboundMessage) -> serde_json::Value {
    match message {
        InboundMessage::Text(text) => serde_json::Value::String(text),
        InboundMessage::Binary(bytes) => serde_json::json!(bytes.to_vec()),
    }
}
