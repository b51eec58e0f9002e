//! Feed Error Taxonomy
//!
//! Four failure classes with distinct recovery paths:
//! - `Transport`: connection-level failure; drives the client connector's
//!   retry/fallback path, never crashes the process
//! - `Protocol`: malformed or unexpected message; answered with an `error`
//!   envelope while the connection stays open
//! - `Generation`: internal fault during a tick; the tick is skipped and
//!   logged, never propagated to subscribers
//! - `NotFound`: unknown node/asset id in a control operation; returned to
//!   the caller

use thiserror::Error;

/// Error type shared across the feed's domain, ports and adapters.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Connection-level failure (socket, HTTP, handshake).
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed or unexpected message on an open connection.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Internal fault while generating a tick.
    #[error("generation fault: {0}")]
    Generation(String),

    /// Unknown identifier in a control operation.
    #[error("unknown {kind}: {id}")]
    NotFound {
        /// What was looked up ("node", "asset").
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },
}

impl FeedError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error is a lookup failure (maps to HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
