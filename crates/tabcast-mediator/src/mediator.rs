//! Token brokering with a single pending-response slot per tab.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tabcast_core::{Error, Result, StreamToken, TabId};
use tabcast_protocol::{MediatorRequest, MediatorResponse};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::platform::{StreamTokenProvider, TabQuery, UiSurface};

type TokenOutcome = Result<StreamToken>;

struct PendingSlot {
    generation: u64,
    sender: oneshot::Sender<TokenOutcome>,
}

/// Process-wide mediator. Stateless relay apart from the pending-request
/// registry, which holds at most one in-flight token slot per tab.
pub struct Mediator {
    tabs: Arc<dyn TabQuery>,
    provider: Arc<dyn StreamTokenProvider>,
    ui: Arc<dyn UiSurface>,
    pending: Mutex<HashMap<TabId, PendingSlot>>,
    generation: AtomicU64,
}

impl Mediator {
    pub fn new(
        tabs: Arc<dyn TabQuery>,
        provider: Arc<dyn StreamTokenProvider>,
        ui: Arc<dyn UiSurface>,
    ) -> Self {
        Self {
            tabs,
            provider,
            ui,
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The currently active, last-focused tab.
    pub async fn resolve_active_tab(&self) -> Result<TabId> {
        self.tabs.active_tab().await
    }

    /// Run the full token round trip: resolve the active tab, register the
    /// pending slot, drive the provider, relay the outcome back.
    ///
    /// A second call while a request is outstanding for the same tab fails
    /// with `ConcurrentRequestRejected`; the first request is undisturbed.
    pub async fn request_token(&self) -> Result<(TabId, StreamToken)> {
        let tab = self.tabs.active_tab().await?;
        let (rx, _guard) = self.begin_request(tab)?;

        let outcome = self.provider.issue(tab).await;
        self.relay_token(tab, outcome);

        let token = rx.await.map_err(|_| Error::RequestCancelled)??;
        debug!("token relayed for tab {}", tab);
        Ok((tab, token))
    }

    /// Register the single pending-response slot for `tab`. The returned
    /// guard clears the slot if the request is dropped before its outcome
    /// is relayed.
    fn begin_request(&self, tab: TabId) -> Result<(oneshot::Receiver<TokenOutcome>, RequestGuard<'_>)> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&tab) {
            warn!("token request already pending for tab {}", tab);
            return Err(Error::ConcurrentRequestRejected(tab));
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        pending.insert(tab, PendingSlot { generation, sender: tx });
        Ok((
            rx,
            RequestGuard {
                mediator: self,
                tab,
                generation,
            },
        ))
    }

    /// Push a resolved outcome to whichever session is awaiting one for
    /// `tab`, clearing the slot. Returns false when nothing was pending.
    pub fn relay_token(&self, tab: TabId, outcome: TokenOutcome) -> bool {
        let slot = self.pending.lock().remove(&tab);
        match slot {
            Some(slot) => slot.sender.send(outcome).is_ok(),
            None => {
                warn!("no pending token request for tab {}", tab);
                false
            }
        }
    }

    /// Drop the pending slot for `tab`, waking the waiter with a
    /// cancellation error. Session-teardown path.
    pub fn cancel_pending(&self, tab: TabId) -> bool {
        self.pending.lock().remove(&tab).is_some()
    }

    /// Number of in-flight token requests.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Best-effort request to surface the auxiliary UI. Failures are
    /// swallowed; the capture path never depends on this.
    pub async fn open_popup(&self) {
        if let Err(e) = self.ui.open_popup().await {
            warn!("popup trigger failed: {}", e);
        }
    }

    /// Cross-context entry point: the wire-message equivalent of
    /// `request_token` and `open_popup`. The stream-id answer carries the
    /// raw token value exactly as the platform minted it.
    pub async fn handle_request(&self, request: MediatorRequest) -> Result<Option<MediatorResponse>> {
        match request {
            MediatorRequest::GetStreamId => {
                let (_tab, token) = self.request_token().await?;
                Ok(Some(MediatorResponse::StreamId {
                    stream_id: token.into_value(),
                }))
            }
            MediatorRequest::OpenPopup => {
                self.open_popup().await;
                Ok(None)
            }
        }
    }
}

/// Clears an abandoned pending slot. Only removes the slot it registered;
/// a newer request that re-used the tab key is left alone.
struct RequestGuard<'a> {
    mediator: &'a Mediator,
    tab: TabId,
    generation: u64,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.mediator.pending.lock();
        if pending.get(&self.tab).map(|s| s.generation) == Some(self.generation) {
            pending.remove(&self.tab);
        }
    }
}
