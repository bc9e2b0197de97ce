//! Demo wiring — one synthetic end-to-end capture session against an
//! in-process consumer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tabcast_capture::{EncoderSettings, SyntheticEncoder, SyntheticSource};
use tabcast_core::{RelayConfig, TabId};
use tabcast_mediator::{FixedTabs, Mediator, MintingProvider, NoopUi};
use tabcast_protocol::CaptureCommand;
use tabcast_session::Orchestrator;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::consumer;

/// Capture for two seconds, then stop and report both sides' totals.
pub async fn run() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let endpoint = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        consumer::handle_relay(stream).await
    });

    let mediator = Arc::new(Mediator::new(
        Arc::new(FixedTabs::new(TabId(1))),
        Arc::new(MintingProvider::new()),
        Arc::new(NoopUi::new()),
    ));
    let (page_tx, mut page_rx) = mpsc::channel(64);
    let config = RelayConfig {
        consumer_host: "127.0.0.1".into(),
        ..RelayConfig::from_env()
    };

    let mut orchestrator = Orchestrator::new(
        config,
        EncoderSettings::default(),
        mediator,
        Arc::new(SyntheticSource::new()),
        Arc::new(SyntheticEncoder::new()),
        page_tx,
    );

    orchestrator.announce_ready().await;
    orchestrator.activate(CaptureCommand::start(port)).await?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    orchestrator.stop_session().await;

    let outcome = orchestrator
        .join()
        .await
        .context("session task did not finish")?;
    info!(
        "demo session {} finished in state {} after {} chunks",
        outcome.id, outcome.state, outcome.chunks_sent
    );

    let stats = endpoint.await??;
    info!(
        "consumer received {} chunks, {} bytes",
        stats.chunks, stats.bytes
    );

    while let Ok(note) = page_rx.try_recv() {
        debug!("page notification: {:?}", note);
    }

    Ok(())
}
