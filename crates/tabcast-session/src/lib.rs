//! Session state machine — coordinates the mediator, the capture pipeline,
//! and the transport into one strictly ordered capture-and-relay lifecycle
//! per activation.
//!
//! Every external occurrence (transport open, token delivery, stream
//! acquisition, chunk emission, encoder fault, out-of-band track removal,
//! inbound consumer message, explicit stop) reaches the session as an event
//! consumed by the single owning task; no shared mutation.

pub mod orchestrator;
pub mod session;
pub mod state;

pub use orchestrator::Orchestrator;
pub use session::{Session, SessionHandle, SessionOutcome};
pub use state::SessionState;
