//! Error types for the session layer.

use netward_protocol::PlayerId;
use netward_transport::ConnectionId;

/// Errors that can occur during authentication and session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was invalid, expired, or rejected by the
    /// [`TokenVerifier`](crate::TokenVerifier).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No session record exists for the player. Authentication requires
    /// a record seeded by the login service.
    #[error("no session for player {0}")]
    SessionMissing(PlayerId),

    /// The session store could not be reached.
    ///
    /// Callers fail closed during authentication and tolerate this
    /// during cleanup (the record expires on its own via TTL).
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// The connection id has already been closed and can never be bound
    /// again.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
}
