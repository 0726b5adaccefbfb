//! The session record: the authoritative "this player is live" fact.

use std::time::Duration;

use netward_protocol::{unix_ms, PlayerId};
use netward_transport::ConnectionId;

/// The record stored in the session store for each live player.
///
/// The store is the cross-process source of truth; the in-process
/// [`PlayerRegistry`](crate::PlayerRegistry) mirrors it for routing.
/// Records carry a TTL so an unclean shutdown leaves nothing behind —
/// a stale record simply expires.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// The player this session belongs to.
    pub player_id: PlayerId,
    /// The connection currently carrying the player.
    pub connection_id: ConnectionId,
    /// When the session was created, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// How long the record stays valid without a refresh.
    pub ttl: Duration,
}

impl SessionRecord {
    /// Creates a record for a player on a connection, stamped now.
    pub fn new(
        player_id: PlayerId,
        connection_id: ConnectionId,
        ttl: Duration,
    ) -> Self {
        Self {
            player_id,
            connection_id,
            created_at_ms: unix_ms(),
            ttl,
        }
    }
}
