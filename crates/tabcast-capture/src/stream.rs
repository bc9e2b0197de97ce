//! Live media streams and the source capability that mints them.

use async_trait::async_trait;
use tabcast_core::{Result, StreamToken};
use tokio::sync::watch;
use tracing::{debug, info};

/// One audio or video track within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Capability that exchanges a single-use token for a live audio+video
/// stream tied to the originating tab.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Consume `token` and return the live stream.
    ///
    /// Fails with `Acquisition` when the token is stale or the tab has
    /// navigated away, and with `TokenAlreadyConsumed` on a replayed
    /// token value. Either failure is terminal for the session.
    async fn acquire(&self, token: StreamToken) -> Result<MediaStream>;
}

/// A live audio+video stream.
///
/// The platform signals out-of-band track removal (tab closed, capture
/// revoked) through the removal signal; release is explicit and
/// idempotent.
pub struct MediaStream {
    id: String,
    tracks: Vec<TrackKind>,
    removed: watch::Receiver<bool>,
    released: bool,
}

impl MediaStream {
    /// Build a stream handle. `removed` flips to true exactly once when
    /// the platform drops the tracks out of band.
    pub fn new(id: impl Into<String>, tracks: Vec<TrackKind>, removed: watch::Receiver<bool>) -> Self {
        Self {
            id: id.into(),
            tracks,
            removed,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[TrackKind] {
        &self.tracks
    }

    /// A watcher for out-of-band track removal, usable from a separate
    /// task while the stream itself stays with its owner.
    pub fn removed_signal(&self) -> watch::Receiver<bool> {
        self.removed.clone()
    }

    /// Stop and release every track. Idempotent: returns the number of
    /// tracks released, which is zero on any call after the first.
    pub fn release(&mut self) -> usize {
        if self.released {
            debug!("stream {} already released", self.id);
            return 0;
        }
        self.released = true;
        info!("releasing {} tracks of stream {}", self.tracks.len(), self.id);
        self.tracks.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}
