//! Error types for tabcast.

use thiserror::Error;

use crate::ids::TabId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no active tab")]
    NoActiveTab,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("tab gone: {0}")]
    TabGone(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send on closed connection")]
    SendOnClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("stream acquisition failed: {0}")]
    Acquisition(String),

    #[error("stream token already consumed")]
    TokenAlreadyConsumed,

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("concurrent token request rejected for tab {0}")]
    ConcurrentRequestRejected(TabId),

    #[error("a capture session is already active")]
    SessionBusy,

    #[error("token request cancelled")]
    RequestCancelled,

    #[error("invalid activation: {0}")]
    Activation(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
