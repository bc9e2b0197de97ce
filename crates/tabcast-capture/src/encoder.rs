//! Incremental encoder lifecycle.

use std::time::Duration;

use bytes::Bytes;
use tabcast_core::Result;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::stream::MediaStream;

/// Opaque encoder parameters, passed through to the platform encoder.
/// The codec/container itself is the encoder's business.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub audio_bits_per_second: u32,
    pub video_bits_per_second: u32,
    pub mime_type: String,
    /// Chunk cadence. A scheduling parameter only — emission is on a fixed
    /// interval, not on frame boundaries, so chunk sizes are irregular.
    pub chunk_interval: Duration,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            audio_bits_per_second: 128_000,
            video_bits_per_second: 2_500_000,
            mime_type: "video/webm".into(),
            chunk_interval: Duration::from_millis(41),
        }
    }
}

/// The three event classes an encoder emits.
#[derive(Debug)]
pub enum EncoderEvent {
    /// One unit of encoded output. May be empty; callers drop empty chunks.
    ChunkReady(Bytes),
    /// The encoder hit a fault. The encoder stays up until stopped.
    Error(String),
    /// Graceful stop completed. Emitted at most once, as the final event.
    Stopped,
}

/// Incremental encoder capability.
pub trait Encoder: Send + Sync {
    /// Begin encoding `stream`, delivering events to `events` until the
    /// returned handle is stopped or dropped.
    fn start(
        &self,
        stream: &MediaStream,
        settings: &EncoderSettings,
        events: mpsc::Sender<EncoderEvent>,
    ) -> Result<EncoderHandle>;
}

/// Handle to a running encoder. Stop is graceful and idempotent; dropping
/// the handle stops the encoder as well.
pub struct EncoderHandle {
    stop_tx: Option<oneshot::Sender<()>>,
}

impl EncoderHandle {
    pub fn new(stop_tx: oneshot::Sender<()>) -> Self {
        Self {
            stop_tx: Some(stop_tx),
        }
    }

    /// Request a graceful stop. Calling on an already-stopped handle is a
    /// no-op.
    pub fn stop(&mut self) {
        match self.stop_tx.take() {
            Some(tx) => {
                let _ = tx.send(());
            }
            None => debug!("encoder already stopped"),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_tx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_idempotent() {
        let (tx, mut rx) = oneshot::channel();
        let mut handle = EncoderHandle::new(tx);
        assert!(!handle.is_stopped());

        handle.stop();
        assert!(handle.is_stopped());
        assert!(rx.try_recv().is_ok());

        // Second and third stops are no-ops.
        handle.stop();
        handle.stop();
    }

    #[test]
    fn test_default_settings() {
        let settings = EncoderSettings::default();
        assert_eq!(settings.audio_bits_per_second, 128_000);
        assert_eq!(settings.video_bits_per_second, 2_500_000);
        assert_eq!(settings.mime_type, "video/webm");
        assert_eq!(settings.chunk_interval, Duration::from_millis(41));
    }
}
