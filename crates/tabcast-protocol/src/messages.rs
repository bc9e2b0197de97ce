//! Message types exchanged between the page, the orchestrator, and the
//! mediator — matching the JSON surface of the capture extension.

use serde::{Deserialize, Serialize};

/// What an activation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationVerb {
    /// Start a capture session; requires a port.
    Start,
    /// Surface the auxiliary UI; ignores the port.
    OpenPopup,
}

/// Activation message posted by the page into the orchestrator context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "CAPTURE_COMMAND")]
pub struct CaptureCommand {
    pub command: ActivationVerb,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl CaptureCommand {
    /// Start-capture activation for the given consumer port.
    pub fn start(port: u16) -> Self {
        Self {
            command: ActivationVerb::Start,
            port: Some(port),
        }
    }

    /// Auxiliary-UI activation.
    pub fn open_popup() -> Self {
        Self {
            command: ActivationVerb::OpenPopup,
            port: None,
        }
    }
}

/// Notification posted by the orchestrator back to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageNotification {
    /// Emitted once at load, before any activation is processed.
    #[serde(rename = "CONTENT_READY")]
    ContentReady,
    /// An inbound transport payload, forwarded verbatim.
    #[serde(rename = "EXTENSION")]
    Extension { message: serde_json::Value },
}

/// Request sent from the orchestrator to the mediator. The tab is resolved
/// on the mediator side; requests carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum MediatorRequest {
    GetStreamId,
    OpenPopup,
}

/// Asynchronous response from the mediator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum MediatorResponse {
    StreamId {
        #[serde(rename = "streamId")]
        stream_id: String,
    },
}
