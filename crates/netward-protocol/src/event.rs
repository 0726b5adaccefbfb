//! Inbound and outbound event shapes.
//!
//! Inbound traffic is name-routed: every frame decodes to an
//! [`EventEnvelope`] whose `event` field picks the handler and whose
//! `data` payload is validated against the handler's declared required
//! fields before any game logic sees it. Outbound traffic is fully
//! typed: [`OutboundEvent`] enumerates every event the server can emit,
//! so a handler cannot send a malformed payload.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChatChannel, MapId, PlayerId};

/// Milliseconds since the Unix epoch, used to stamp outbound events.
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// EventEnvelope (inbound)
// ---------------------------------------------------------------------------

/// A named inbound event with an opaque payload.
///
/// The wire shape is `{"event": "chat:message", "data": {...}}`. The
/// payload stays a raw [`Value`] until the dispatcher has checked the
/// handler's required fields; handlers then pull out what they need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The event name, e.g. `movement:request`.
    pub event: String,

    /// The event payload. Missing on the wire means an empty payload
    /// (`ping` sends none).
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    /// Creates an envelope from an event name and payload.
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Returns the required fields absent from the payload.
    ///
    /// A field is present when the payload is a JSON object containing
    /// the key with a non-null value; anything else counts as missing.
    pub fn missing_fields(
        &self,
        required: &[&'static str],
    ) -> Vec<&'static str> {
        let obj = self.data.as_object();
        required
            .iter()
            .filter(|field| {
                obj.and_then(|o| o.get(**field))
                    .map_or(true, Value::is_null)
            })
            .copied()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// OutboundEvent (server → client)
// ---------------------------------------------------------------------------

/// Every event the server can push to a client.
///
/// Serializes to the same `{"event": ..., "data": {...}}` shape as
/// inbound traffic, with camelCase payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
    /// Authentication succeeded; the connection is now bound to a player.
    #[serde(rename = "auth:success", rename_all = "camelCase")]
    AuthSuccess {
        player_id: PlayerId,
        character_id: String,
    },

    /// Authentication failed; the connection will be closed.
    #[serde(rename = "auth:error")]
    AuthError { message: String },

    /// A movement request was accepted for processing.
    #[serde(rename = "movement:processing", rename_all = "camelCase")]
    MovementProcessing { request_id: Value },

    /// A combat action was accepted for processing.
    #[serde(rename = "combat:processing", rename_all = "camelCase")]
    CombatProcessing { action_id: Value },

    /// A chat message delivered to a channel the client is in.
    #[serde(rename = "chat:message", rename_all = "camelCase")]
    ChatMessage {
        player_id: PlayerId,
        channel: ChatChannel,
        message: String,
        timestamp: u64,
    },

    /// A direct message from another player.
    #[serde(rename = "chat:private")]
    ChatPrivate {
        from: PlayerId,
        message: String,
        timestamp: u64,
    },

    /// A chat-specific failure (rate limit, unknown target, bad channel).
    #[serde(rename = "chat:error")]
    ChatError { message: String },

    /// A player entered a map the client is on.
    #[serde(rename = "entity:spawn", rename_all = "camelCase")]
    EntitySpawn {
        player_id: PlayerId,
        map_id: MapId,
        timestamp: u64,
    },

    /// A player left a map the client is on.
    #[serde(rename = "entity:despawn", rename_all = "camelCase")]
    EntityDespawn {
        player_id: PlayerId,
        map_id: MapId,
        timestamp: u64,
    },

    /// Keep-alive reply.
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },

    /// Generic failure not tied to a specific event family.
    #[serde(rename = "error")]
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
