//! Room membership and fan-out for Netward.
//!
//! A room is a named broadcast scope — a map, a chat channel, or a
//! player's private room. Connections join and leave rooms freely
//! (many-to-many), and the [`RoomRouter`] fans events out to whoever is
//! a member at the moment of the call.
//!
//! # Key types
//!
//! - [`RoomRouter`] — membership tables + per-connection outbound senders
//! - [`Outbound`] / [`OutboundSender`] — what flows to a connection's
//!   writer task
//! - [`RoomError`]

mod error;
mod outbound;
mod router;

pub use error::RoomError;
pub use outbound::{Outbound, OutboundSender};
pub use router::RoomRouter;
