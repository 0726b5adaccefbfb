//! Error types for the room layer.

use netward_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The connection has no registered outbound sender — it was never
    /// registered with the router, or has already been deregistered.
    #[error("connection {0} is not registered with the router")]
    UnknownConnection(ConnectionId),
}
