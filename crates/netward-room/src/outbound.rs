//! The per-connection outbound channel.

use netward_protocol::OutboundEvent;
use tokio::sync::mpsc;

/// What the router can push at a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// An event to serialize and send to the client.
    Event(OutboundEvent),
    /// Tell the writer to send a close frame and stop. Carries the
    /// close reason shown to the client (e.g. "superseded by new login").
    Close { reason: String },
}

/// Channel sender delivering [`Outbound`] items to one connection.
///
/// Unbounded: senders never await, so fan-out can run under the router
/// lock without suspending. Per-connection ordering is the channel's
/// FIFO ordering.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;
