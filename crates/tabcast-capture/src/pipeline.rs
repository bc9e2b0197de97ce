//! Bridges the encoder and the stream's removal signal into one ordered
//! event channel owned by the session.

use std::sync::Arc;

use bytes::Bytes;
use tabcast_core::{Result, StreamToken};
use tokio::sync::mpsc;

use crate::encoder::{Encoder, EncoderEvent, EncoderHandle, EncoderSettings};
use crate::stream::{MediaSource, MediaStream};

/// Events observed while a capture is live.
#[derive(Debug)]
pub enum CaptureEvent {
    /// One encoded chunk, in emission order.
    Chunk(Bytes),
    /// Encoder fault; the session reports it once, then stops the encoder.
    EncoderError(String),
    /// Graceful stop completed.
    EncoderStopped,
    /// The platform removed the tracks out of band. A termination trigger,
    /// not an error.
    TracksRemoved,
}

/// One session's capture pipeline: token-for-stream exchange plus encoder
/// lifecycle.
pub struct CapturePipeline {
    source: Arc<dyn MediaSource>,
    encoder: Arc<dyn Encoder>,
}

impl CapturePipeline {
    pub fn new(source: Arc<dyn MediaSource>, encoder: Arc<dyn Encoder>) -> Self {
        Self { source, encoder }
    }

    /// Exchange the single-use token for a live stream.
    pub async fn acquire(&self, token: StreamToken) -> Result<MediaStream> {
        self.source.acquire(token).await
    }

    /// Start the encoder on `stream` and return its handle plus the merged
    /// event stream (encoder events and out-of-band track removal).
    pub fn start(
        &self,
        stream: &MediaStream,
        settings: &EncoderSettings,
    ) -> Result<(EncoderHandle, mpsc::Receiver<CaptureEvent>)> {
        let (tx, rx) = mpsc::channel(64);

        let (encoder_tx, mut encoder_rx) = mpsc::channel(64);
        let handle = self.encoder.start(stream, settings, encoder_tx)?;

        let bridge_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(event) = encoder_rx.recv().await {
                let mapped = match event {
                    EncoderEvent::ChunkReady(chunk) => CaptureEvent::Chunk(chunk),
                    EncoderEvent::Error(reason) => CaptureEvent::EncoderError(reason),
                    EncoderEvent::Stopped => CaptureEvent::EncoderStopped,
                };
                let last = matches!(mapped, CaptureEvent::EncoderStopped);
                if bridge_tx.send(mapped).await.is_err() || last {
                    break;
                }
            }
        });

        let mut removed = stream.removed_signal();
        tokio::spawn(async move {
            loop {
                if *removed.borrow() {
                    let _ = tx.send(CaptureEvent::TracksRemoved).await;
                    break;
                }
                if removed.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok((handle, rx))
    }
}
