//! Page-facing orchestrator — consumes activation messages, enforces the
//! one-session policy, and surfaces notifications back to the page.

use std::sync::Arc;

use tabcast_capture::{CapturePipeline, Encoder, EncoderSettings, MediaSource};
use tabcast_core::{Error, RelayConfig, Result};
use tabcast_mediator::Mediator;
use tabcast_protocol::{ActivationVerb, CaptureCommand, PageNotification};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::session::{Session, SessionHandle, SessionOutcome};

struct ActiveSession {
    handle: SessionHandle,
    task: JoinHandle<SessionOutcome>,
}

/// Orchestrator for one page context. Owns the activation surface and at
/// most one live session at a time.
pub struct Orchestrator {
    config: RelayConfig,
    settings: EncoderSettings,
    mediator: Arc<Mediator>,
    source: Arc<dyn MediaSource>,
    encoder: Arc<dyn Encoder>,
    page_tx: mpsc::Sender<PageNotification>,
    active: Option<ActiveSession>,
}

impl Orchestrator {
    pub fn new(
        config: RelayConfig,
        settings: EncoderSettings,
        mediator: Arc<Mediator>,
        source: Arc<dyn MediaSource>,
        encoder: Arc<dyn Encoder>,
        page_tx: mpsc::Sender<PageNotification>,
    ) -> Self {
        Self {
            config,
            settings,
            mediator,
            source,
            encoder,
            page_tx,
            active: None,
        }
    }

    /// Announce readiness to the page. Emitted once at load, before any
    /// activation is processed.
    pub async fn announce_ready(&self) {
        let _ = self.page_tx.send(PageNotification::ContentReady).await;
    }

    /// Process one activation message.
    ///
    /// `start` spawns a fresh session for the given port; a second `start`
    /// while a session is live is rejected with `SessionBusy`. `open-popup`
    /// is relayed to the mediator and never fails the caller.
    pub async fn activate(&mut self, command: CaptureCommand) -> Result<()> {
        match command.command {
            ActivationVerb::OpenPopup => {
                self.mediator.open_popup().await;
                Ok(())
            }
            ActivationVerb::Start => {
                let port = command
                    .port
                    .ok_or_else(|| Error::Activation("start requires a port".into()))?;
                if let Some(active) = &self.active {
                    if !active.handle.state().is_terminal() {
                        return Err(Error::SessionBusy);
                    }
                }

                let pipeline = CapturePipeline::new(self.source.clone(), self.encoder.clone());
                let (session, handle) = Session::new(
                    self.config.clone(),
                    self.settings.clone(),
                    self.mediator.clone(),
                    pipeline,
                );
                info!("session {} activated on port {}", handle.id(), port);

                let page = self.page_tx.clone();
                let task = tokio::spawn(session.run(port, page));
                self.active = Some(ActiveSession { handle, task });
                Ok(())
            }
        }
    }

    /// Handle to the most recently activated session, if any.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    /// Signal the live session to stop. No-op when none is running.
    pub async fn stop_session(&self) {
        if let Some(active) = &self.active {
            active.handle.stop().await;
        }
    }

    /// Wait for the current session to finish and return its outcome.
    pub async fn join(&mut self) -> Option<SessionOutcome> {
        let active = self.active.take()?;
        match active.task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("session task failed: {}", e);
                None
            }
        }
    }
}
