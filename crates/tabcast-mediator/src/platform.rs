//! Platform capabilities the mediator depends on, with in-process
//! implementations for tests and the demo wiring.

use async_trait::async_trait;
use parking_lot::Mutex;
use tabcast_core::{Error, Result, StreamToken, TabId};

/// Access to the browser's tab list.
#[async_trait]
pub trait TabQuery: Send + Sync {
    /// The currently active, last-focused tab.
    async fn active_tab(&self) -> Result<TabId>;
}

/// Capability that converts a tab identifier into a single-use capture
/// token. Failure reasons originate on the platform side as plain strings.
#[async_trait]
pub trait StreamTokenProvider: Send + Sync {
    async fn issue(&self, tab: TabId) -> Result<StreamToken>;
}

/// Best-effort UI trigger. Failures are non-critical.
#[async_trait]
pub trait UiSurface: Send + Sync {
    async fn open_popup(&self) -> Result<()>;
}

/// Tab query with a fixed answer.
pub struct FixedTabs {
    active: Option<TabId>,
}

impl FixedTabs {
    /// Always report `tab` as the active, last-focused tab.
    pub fn new(tab: TabId) -> Self {
        Self { active: Some(tab) }
    }

    /// Report no active tab at all.
    pub fn empty() -> Self {
        Self { active: None }
    }
}

#[async_trait]
impl TabQuery for FixedTabs {
    async fn active_tab(&self) -> Result<TabId> {
        self.active.ok_or(Error::NoActiveTab)
    }
}

/// Token provider that mints sequential `tok-<n>` values. Can be scripted
/// to fail.
pub struct MintingProvider {
    next: Mutex<u32>,
    fail_with: Mutex<Option<Error>>,
}

impl MintingProvider {
    pub fn new() -> Self {
        Self {
            next: Mutex::new(1),
            fail_with: Mutex::new(None),
        }
    }

    /// Make the next issuance fail with a permission denial.
    pub fn deny_next(&self, reason: impl Into<String>) {
        *self.fail_with.lock() = Some(Error::PermissionDenied(reason.into()));
    }

    /// Make the next issuance fail as if the tab disappeared.
    pub fn lose_tab_next(&self, reason: impl Into<String>) {
        *self.fail_with.lock() = Some(Error::TabGone(reason.into()));
    }
}

impl Default for MintingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamTokenProvider for MintingProvider {
    async fn issue(&self, _tab: TabId) -> Result<StreamToken> {
        if let Some(error) = self.fail_with.lock().take() {
            return Err(error);
        }
        let mut next = self.next.lock();
        let token = StreamToken::new(format!("tok-{}", *next));
        *next += 1;
        Ok(token)
    }
}

/// UI surface that does nothing, optionally failing to exercise the
/// swallow path.
pub struct NoopUi {
    fail: bool,
}

impl NoopUi {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for NoopUi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UiSurface for NoopUi {
    async fn open_popup(&self) -> Result<()> {
        if self.fail {
            Err(Error::Internal("popup surface unavailable".into()))
        } else {
            Ok(())
        }
    }
}
