//! Built-in handlers for the core inbound events.
//!
//! Each handler module covers one event family:
//! - [`movement`] — `movement:request`
//! - [`combat`] — `combat:action`
//! - [`chat`] — `chat:message`, `chat:private`
//! - [`map`] — `map:enter`, `map:leave`
//!
//! plus `ping` handled inline here. The generic checks (auth, rate,
//! required fields) already ran in the dispatcher by the time a handler
//! sees an event; handlers only validate types and semantics of their
//! own payloads and report failures as typed error events themselves.

mod chat;
mod combat;
mod map;
mod movement;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netward_limit::RatePolicy;
use netward_protocol::{unix_ms, OutboundEvent};
use serde_json::Value;

use crate::{Dispatcher, EventHandler, GatewayError, Peer, ServerContext};

/// Wires every built-in handler, with its declared schema and rate
/// policy, into a dispatcher.
pub(crate) fn register_defaults(dispatcher: &mut Dispatcher) {
    dispatcher.register(
        "movement:request",
        &["requestId"],
        Some(RatePolicy::per(Duration::from_secs(1), 20)),
        Arc::new(movement::MovementRequest),
    );
    dispatcher.register(
        "combat:action",
        &["actionId"],
        Some(RatePolicy::per(Duration::from_secs(1), 10)),
        Arc::new(combat::CombatAction),
    );
    dispatcher.register(
        "chat:message",
        &["channel", "message"],
        Some(RatePolicy::per(Duration::from_secs(60), 30)),
        Arc::new(chat::ChatMessage),
    );
    dispatcher.register(
        "chat:private",
        &["targetPlayerId", "message"],
        Some(RatePolicy::per(Duration::from_secs(60), 20)),
        Arc::new(chat::ChatPrivate),
    );
    dispatcher.register(
        "map:enter",
        &["mapId"],
        Some(RatePolicy::per(Duration::from_secs(10), 10)),
        Arc::new(map::MapEnter),
    );
    dispatcher.register(
        "map:leave",
        &["mapId"],
        Some(RatePolicy::per(Duration::from_secs(10), 10)),
        Arc::new(map::MapLeave),
    );
    dispatcher.register("ping", &[], None, Arc::new(Ping));
}

/// Keep-alive: replies `pong` with the server's clock.
struct Ping;

#[async_trait]
impl EventHandler for Ping {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        _data: &Value,
    ) -> Result<(), GatewayError> {
        ctx.rooms.lock().await.send_to(
            peer.connection_id,
            OutboundEvent::Pong {
                timestamp: unix_ms(),
            },
        );
        Ok(())
    }
}
