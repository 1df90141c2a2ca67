//! Crate-wide error type.
//!
//! # Design Decisions
//! - One enum for every subsystem; the `Display` text is what goes back to
//!   clients inside `{"error": ...}`
//! - Outbound failures (probe, forward, sync) collapse into
//!   `PeerUnreachable` or `Timeout`; callers treat both the same way
//! - Nothing here is fatal to a running process except at startup

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid JSON, unknown action or a missing field.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("failed to persist store to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("frame error: {0}")]
    Frame(String),

    #[error("connection closed before a response was received")]
    ConnectionClosed,

    #[error("store task is no longer running")]
    StoreUnavailable,

    #[error("no backend with id `{0}` in configuration")]
    UnknownNode(String),

    #[error(transparent)]
    Listener(#[from] crate::net::ListenerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn unreachable(peer: impl ToString, reason: impl ToString) -> Self {
        Error::PeerUnreachable {
            peer: peer.to_string(),
            reason: reason.to_string(),
        }
    }
}
