//! Privileged mediator — brokers single-use stream tokens between the
//! platform and whichever session is awaiting one, and triggers auxiliary
//! UI surfaces on request.
//!
//! The mediator is a process-wide singleton holding no per-session state
//! beyond one in-flight token slot per tab.

pub mod mediator;
pub mod platform;

pub use mediator::Mediator;
pub use platform::{FixedTabs, MintingProvider, NoopUi, StreamTokenProvider, TabQuery, UiSurface};
