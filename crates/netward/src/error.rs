//! Unified error type for the Netward gateway.

use netward_protocol::ProtocolError;
use netward_room::RoomError;
use netward_session::SessionError;
use netward_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `netward` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid event).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, store, registry).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error.
    #[error(transparent)]
    Room(#[from] RoomError),
}
