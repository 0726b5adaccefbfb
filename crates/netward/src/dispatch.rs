//! The event dispatcher: an explicit table of per-event handlers.
//!
//! Every inbound event passes the same generic gauntlet exactly once,
//! here, instead of each handler re-checking it:
//!
//! 1. the connection must be authenticated,
//! 2. the handler's declared rate policy must admit the event,
//! 3. the handler's declared required fields must be present.
//!
//! Only then is the handler invoked. A handler error is caught at this
//! boundary and converted to a typed error event — it never terminates
//! the connection, let alone a sibling's.
//!
//! Events are processed inline on the owning connection's task, so a
//! connection's events are handled strictly in arrival order while
//! different connections proceed independently.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use netward_limit::RatePolicy;
use netward_protocol::{EventEnvelope, OutboundEvent, PlayerId};
use netward_transport::ConnectionId;
use serde_json::Value;

use crate::{GatewayError, ServerContext};

/// The authenticated connection an event arrived on.
#[derive(Debug, Clone)]
pub struct Peer {
    /// The transport connection carrying the player.
    pub connection_id: ConnectionId,
    /// The player bound to it.
    pub player_id: PlayerId,
}

/// A per-event handler: the seam through which game-logic collaborators
/// receive validated events.
///
/// Handlers deliver replies through the context's room router
/// (`send_to` back to the peer, `broadcast` into a room) and may emit
/// zero or more outbound events. They run inline on the peer's
/// connection task — anything slow must be a suspension point, never a
/// blocking call.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one validated event from an authenticated peer.
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError>;
}

struct HandlerEntry {
    /// Payload fields that must be present (non-null) before the
    /// handler runs.
    required: &'static [&'static str],
    /// Per-peer admission window for this event, if any.
    rate: Option<RatePolicy>,
    handler: Arc<dyn EventHandler>,
}

/// Maps inbound event names to their handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, HandlerEntry>,
}

impl Dispatcher {
    /// Creates an empty dispatcher with no handlers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with the built-in handlers for every
    /// core event (movement, combat, chat, map, ping).
    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        crate::handlers::register_defaults(&mut dispatcher);
        dispatcher
    }

    /// Registers (or replaces) the handler for an event name, together
    /// with its declared schema and rate policy.
    pub fn register(
        &mut self,
        event: impl Into<String>,
        required: &'static [&'static str],
        rate: Option<RatePolicy>,
        handler: Arc<dyn EventHandler>,
    ) {
        self.handlers.insert(
            event.into(),
            HandlerEntry {
                required,
                rate,
                handler,
            },
        );
    }

    /// Overrides the rate policy of an already-registered event.
    /// Returns `false` if no handler is registered under that name.
    pub fn set_rate_policy(
        &mut self,
        event: &str,
        rate: Option<RatePolicy>,
    ) -> bool {
        match self.handlers.get_mut(event) {
            Some(entry) => {
                entry.rate = rate;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a handler is registered for the event name.
    pub fn has_handler(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Runs one inbound event through the checks and its handler.
    pub(crate) async fn dispatch(
        &self,
        ctx: &ServerContext,
        connection_id: ConnectionId,
        player: Option<&PlayerId>,
        envelope: EventEnvelope,
    ) {
        let event = envelope.event.as_str();

        // 1. Authentication gate.
        let Some(player_id) = player else {
            reply(ctx, connection_id, typed_error(event, "Not authenticated"))
                .await;
            return;
        };

        let Some(entry) = self.handlers.get(event) else {
            reply(
                ctx,
                connection_id,
                typed_error(event, format!("Unknown event: {event}")),
            )
            .await;
            return;
        };

        // 2. Action-level rate window, keyed per connection + event.
        if let Some(policy) = &entry.rate {
            let key = format!("{connection_id}:{event}");
            if !ctx.action_limiter.allow_policy(&key, policy).await {
                tracing::debug!(%connection_id, event, "action rate limited");
                reply(
                    ctx,
                    connection_id,
                    typed_error(event, "Too many requests"),
                )
                .await;
                return;
            }
        }

        // 3. Payload shape.
        let missing = envelope.missing_fields(entry.required);
        if !missing.is_empty() {
            reply(
                ctx,
                connection_id,
                typed_error(
                    event,
                    format!(
                        "Missing required field(s): {}",
                        missing.join(", ")
                    ),
                ),
            )
            .await;
            return;
        }

        // 4. Hand off to the handler; its failure stays its own.
        let peer = Peer {
            connection_id,
            player_id: player_id.clone(),
        };
        if let Err(e) =
            entry.handler.handle(ctx, &peer, &envelope.data).await
        {
            tracing::warn!(
                %connection_id, event, error = %e,
                "handler failed"
            );
            reply(ctx, connection_id, typed_error(event, e.to_string()))
                .await;
        }
    }
}

/// Chat events get `chat:error`; everything else the generic `error`.
fn typed_error(event: &str, message: impl Into<String>) -> OutboundEvent {
    let message = message.into();
    if event.starts_with("chat:") {
        OutboundEvent::ChatError { message }
    } else {
        OutboundEvent::Error { message }
    }
}

async fn reply(
    ctx: &ServerContext,
    connection_id: ConnectionId,
    event: OutboundEvent,
) {
    // A vanished connection is fine — the error has nowhere to go.
    let _ = ctx.rooms.lock().await.send_to(connection_id, event);
}

// =========================================================================
// Tests
// =========================================================================
