//! Capture-relay protocol — the message surfaces between the page, the
//! orchestrator, and the mediator, plus the wire handshake constant.

pub mod messages;

pub use messages::{
    ActivationVerb, CaptureCommand, MediatorRequest, MediatorResponse, PageNotification,
};

/// Literal first frame sent on every relay connection, before any chunk.
pub const HANDSHAKE: &str = "hello from extension";
