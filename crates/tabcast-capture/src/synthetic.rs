//! Synthetic media source and encoder — deterministic in-process stand-ins
//! for the platform capture primitives, used by tests and the demo wiring.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tabcast_core::{Error, Result, StreamToken};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::encoder::{Encoder, EncoderEvent, EncoderHandle, EncoderSettings};
use crate::stream::{MediaSource, MediaStream, TrackKind};

/// Media source that mints streams from token values, tracking spent
/// values so replays are rejected.
pub struct SyntheticSource {
    consumed: Mutex<HashSet<String>>,
    removals: Mutex<HashMap<String, watch::Sender<bool>>>,
    fail_with: Mutex<Option<String>>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            consumed: Mutex::new(HashSet::new()),
            removals: Mutex::new(HashMap::new()),
            fail_with: Mutex::new(None),
        }
    }

    /// Make the next acquisition fail, as if the tab navigated away.
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_with.lock() = Some(reason.into());
    }

    /// Simulate out-of-band track removal (tab closed, capture revoked).
    /// Returns false if the stream is unknown.
    pub fn remove_tracks(&self, stream_id: &str) -> bool {
        match self.removals.lock().get(stream_id) {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticSource {
    async fn acquire(&self, token: StreamToken) -> Result<MediaStream> {
        if let Some(reason) = self.fail_with.lock().take() {
            return Err(Error::Acquisition(reason));
        }

        let value = token.into_value();
        if !self.consumed.lock().insert(value.clone()) {
            return Err(Error::TokenAlreadyConsumed);
        }

        let stream_id = format!("stream-{}", value);
        let (removed_tx, removed_rx) = watch::channel(false);
        self.removals.lock().insert(stream_id.clone(), removed_tx);

        info!("stream {} acquired", stream_id);
        Ok(MediaStream::new(
            stream_id,
            vec![TrackKind::Audio, TrackKind::Video],
            removed_rx,
        ))
    }
}

/// Encoder that emits deterministic pattern chunks on the configured
/// cadence. Can be scripted to fault after a given chunk count, or to
/// emit zero-length chunks (which consumers of the event stream drop).
pub struct SyntheticEncoder {
    chunk_size: usize,
    fail_after: Option<u32>,
    empty_every: Option<u32>,
}

impl SyntheticEncoder {
    pub fn new() -> Self {
        Self {
            chunk_size: 256,
            fail_after: None,
            empty_every: None,
        }
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::new()
        }
    }

    /// Emit an encoder fault after `count` chunks.
    pub fn failing_after(count: u32) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::new()
        }
    }

    /// Emit a zero-length chunk every `nth` tick.
    pub fn emitting_empty_every(nth: u32) -> Self {
        Self {
            empty_every: Some(nth.max(1)),
            ..Self::new()
        }
    }
}

impl Default for SyntheticEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for SyntheticEncoder {
    fn start(
        &self,
        stream: &MediaStream,
        settings: &EncoderSettings,
        events: mpsc::Sender<EncoderEvent>,
    ) -> Result<EncoderHandle> {
        if stream.is_released() {
            return Err(Error::Encoder("stream already released".into()));
        }

        let cadence = settings.chunk_interval;
        let chunk_size = self.chunk_size.max(1);
        let fail_after = self.fail_after;
        let empty_every = self.empty_every;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut seq: u32 = 0;
            let mut faulted = false;

            loop {
                tokio::select! {
                    // A dropped handle counts as a stop request.
                    _ = &mut stop_rx => {
                        let _ = events.send(EncoderEvent::Stopped).await;
                        break;
                    }
                    _ = interval.tick() => {
                        if faulted {
                            continue;
                        }
                        seq += 1;
                        if fail_after == Some(seq) {
                            faulted = true;
                            let fault = format!("synthetic fault at chunk {}", seq);
                            if events.send(EncoderEvent::Error(fault)).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        let chunk = if empty_every.is_some_and(|n| seq % n == 0) {
                            Bytes::new()
                        } else {
                            pattern_chunk(seq, chunk_size)
                        };
                        if events.send(EncoderEvent::ChunkReady(chunk)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(EncoderHandle::new(stop_tx))
    }
}

/// Deterministic non-empty chunk payload: the sequence number repeated.
fn pattern_chunk(seq: u32, size: usize) -> Bytes {
    Bytes::from(vec![(seq & 0xff) as u8; size])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn acquire(source: &SyntheticSource, value: &str) -> MediaStream {
        source.acquire(StreamToken::new(value)).await.unwrap()
    }

    #[tokio::test]
    async fn test_token_replay_rejected() {
        let source = SyntheticSource::new();
        acquire(&source, "tok-1").await;

        let replay = source.acquire(StreamToken::new("tok-1")).await;
        assert!(matches!(replay, Err(Error::TokenAlreadyConsumed)));

        // A fresh token still works.
        acquire(&source, "tok-2").await;
    }

    #[tokio::test]
    async fn test_scripted_acquisition_failure() {
        let source = SyntheticSource::new();
        source.fail_next("tab navigated away");
        match source.acquire(StreamToken::new("tok-1")).await {
            Err(Error::Acquisition(reason)) => assert_eq!(reason, "tab navigated away"),
            _ => panic!("expected acquisition failure"),
        }
    }

    #[tokio::test]
    async fn test_remove_tracks_signals_stream() {
        let source = SyntheticSource::new();
        let stream = acquire(&source, "tok-1").await;
        let mut signal = stream.removed_signal();

        assert!(source.remove_tracks(stream.id()));
        signal.changed().await.unwrap();
        assert!(*signal.borrow());

        assert!(!source.remove_tracks("stream-unknown"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence() {
        let source = SyntheticSource::new();
        let stream = acquire(&source, "tok-1").await;

        let settings = EncoderSettings {
            chunk_interval: Duration::from_millis(40),
            ..EncoderSettings::default()
        };
        let (tx, mut rx) = mpsc::channel(16);
        let encoder = SyntheticEncoder::with_chunk_size(8);
        let mut handle = encoder.start(&stream, &settings, tx).unwrap();

        let started = tokio::time::Instant::now();
        for seq in 1..=4u8 {
            match rx.recv().await.unwrap() {
                EncoderEvent::ChunkReady(chunk) => {
                    assert_eq!(chunk.len(), 8);
                    assert_eq!(chunk[0], seq);
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        // First chunk fires immediately, the rest on the cadence.
        assert_eq!(started.elapsed(), Duration::from_millis(120));
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_chunk_after_stopped() {
        let source = SyntheticSource::new();
        let stream = acquire(&source, "tok-1").await;

        let (tx, mut rx) = mpsc::channel(16);
        let encoder = SyntheticEncoder::new();
        let mut handle = encoder.start(&stream, &EncoderSettings::default(), tx).unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            EncoderEvent::ChunkReady(_)
        ));
        handle.stop();

        // Everything after the stop request drains to a single Stopped.
        let mut saw_stopped = false;
        while let Some(event) = rx.recv().await {
            match event {
                EncoderEvent::ChunkReady(_) if saw_stopped => {
                    panic!("chunk after Stopped")
                }
                EncoderEvent::Stopped => {
                    assert!(!saw_stopped, "Stopped emitted twice");
                    saw_stopped = true;
                }
                _ => {}
            }
        }
        assert!(saw_stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chunks_on_schedule() {
        let source = SyntheticSource::new();
        let stream = acquire(&source, "tok-1").await;

        let (tx, mut rx) = mpsc::channel(16);
        let encoder = SyntheticEncoder::emitting_empty_every(2);
        let mut handle = encoder
            .start(&stream, &EncoderSettings::default(), tx)
            .unwrap();

        // Odd ticks carry payload, even ticks are empty.
        let mut lengths = Vec::new();
        for _ in 0..4 {
            match rx.recv().await.unwrap() {
                EncoderEvent::ChunkReady(chunk) => lengths.push(chunk.len()),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert!(lengths[0] > 0);
        assert_eq!(lengths[1], 0);
        assert!(lengths[2] > 0);
        assert_eq!(lengths[3], 0);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_then_silence() {
        let source = SyntheticSource::new();
        let stream = acquire(&source, "tok-1").await;

        let settings = EncoderSettings::default();
        let (tx, mut rx) = mpsc::channel(16);
        let encoder = SyntheticEncoder::failing_after(3);
        let mut handle = encoder.start(&stream, &settings, tx).unwrap();

        let mut chunks = 0;
        loop {
            match rx.recv().await.unwrap() {
                EncoderEvent::ChunkReady(_) => chunks += 1,
                EncoderEvent::Error(reason) => {
                    assert!(reason.contains("chunk 3"));
                    break;
                }
                EncoderEvent::Stopped => panic!("stopped before fault"),
            }
        }
        assert_eq!(chunks, 2);

        // Faulted encoder emits nothing further until stopped.
        handle.stop();
        assert!(matches!(rx.recv().await.unwrap(), EncoderEvent::Stopped));
        assert!(rx.recv().await.is_none());
    }
}
