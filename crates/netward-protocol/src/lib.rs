//! Wire protocol for Netward.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity types** ([`PlayerId`], [`MapId`], [`RoomId`],
//!   [`ChatChannel`]) — who is talking and which broadcast scope a
//!   message targets.
//! - **Events** ([`EventEnvelope`] inbound, [`OutboundEvent`] outbound) —
//!   the named events that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events become bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong along the way.
//!
//! The protocol layer sits between transport (raw frames) and session
//! (player identity). It doesn't know about connections or rooms — it
//! only knows how to name, shape, and serialize events.

mod codec;
mod error;
mod event;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{unix_ms, EventEnvelope, OutboundEvent};
pub use types::{ChatChannel, MapId, PlayerId, RoomId};
