//! The process-scoped server context.
//!
//! One `ServerContext` per server process owns every piece of shared
//! state: the player registry, the room router, both rate limiter
//! stores, and the external collaborators (token verifier, session
//! store). It is created by the builder and passed to the gateway and
//! dispatcher at construction — there is no ambient global state.

use std::sync::Arc;

use netward_limit::RateLimiter;
use netward_protocol::{JsonCodec, MapId, OutboundEvent, PlayerId, RoomId};
use netward_room::RoomRouter;
use netward_session::{PlayerRegistry, SessionStore, TokenVerifier};
use tokio::sync::Mutex;

use crate::GatewayConfig;

/// Shared server state passed to each connection task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// registry and router are plain structs behind `Mutex`es: every
/// mutation and lookup serializes through the lock, so no task can
/// observe a half-updated mapping.
pub struct ServerContext {
    pub(crate) registry: Mutex<PlayerRegistry>,
    pub(crate) rooms: Mutex<RoomRouter>,
    /// Windows for connection-scoped traffic (admission + raw frames).
    pub(crate) conn_limiter: RateLimiter,
    /// Windows for per-action policies. A separate store from
    /// `conn_limiter`: the two key spaces never share eviction.
    pub(crate) action_limiter: RateLimiter,
    pub(crate) verifier: Arc<dyn TokenVerifier>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: GatewayConfig,
}

impl ServerContext {
    pub(crate) fn new(
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn SessionStore>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            registry: Mutex::new(PlayerRegistry::new()),
            rooms: Mutex::new(RoomRouter::new()),
            conn_limiter: RateLimiter::new(),
            action_limiter: RateLimiter::new(),
            verifier,
            store,
            codec: JsonCodec,
            config,
        }
    }

    // -- Push API for external collaborators ------------------------------

    /// Delivers an event to every connection currently on a map.
    ///
    /// Snapshot semantics: connections joining or leaving concurrently
    /// may or may not see the event. Returns the delivery count.
    pub async fn broadcast_to_map(
        &self,
        map_id: MapId,
        event: OutboundEvent,
    ) -> usize {
        self.rooms
            .lock()
            .await
            .broadcast(&RoomId::map(map_id), &event, None)
    }

    /// Delivers an event to one player, wherever they are connected.
    ///
    /// Returns `false` if the player is offline — never an error, so a
    /// late send racing a disconnect cannot blow up the caller.
    pub async fn send_to_player(
        &self,
        player_id: &PlayerId,
        event: OutboundEvent,
    ) -> bool {
        let Some(conn_id) =
            self.registry.lock().await.connection_for(player_id)
        else {
            return false;
        };
        self.rooms.lock().await.send_to(conn_id, event)
    }

    /// Number of players currently authenticated and bound.
    pub async fn online_player_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    // -- Shared state access for game-logic collaborators -----------------

    /// The room router, for managing game-driven memberships (guild and
    /// party channels, instanced scopes).
    pub fn rooms(&self) -> &Mutex<RoomRouter> {
        &self.rooms
    }

    /// The player↔connection registry.
    pub fn registry(&self) -> &Mutex<PlayerRegistry> {
        &self.registry
    }

    /// The gateway configuration in effect.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
