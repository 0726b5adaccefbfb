//! The player↔connection registry: in-process routing truth.
//!
//! The registry is the single place that answers "which connection is
//! player P on?" and "which player is connection C carrying?". Every
//! in-process delivery (private messages, push API sends) resolves
//! through it.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is NOT thread-safe by itself — it uses plain
//! `HashMap`s, not concurrent ones. The gateway owns it behind a single
//! `Mutex` on the server context, which keeps both directions of the
//! mapping atomic with respect to lookups: no caller can ever observe a
//! half-removed pair.

use std::collections::{HashMap, HashSet};

use netward_protocol::PlayerId;
use netward_transport::ConnectionId;

use crate::SessionError;

/// Bidirectional mapping between live players and their connections.
///
/// ## Invariants
///
/// - At most one connection per player: a `bind` for an already-live
///   player evicts the prior connection's binding and reports it so the
///   gateway can force-disconnect it.
/// - The two directions always agree: `player_for(connection_for(p)) == p`
///   whenever `connection_for(p)` is present.
/// - A connection id that has been unbound (or evicted) is retired and
///   can never be bound again.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    /// Player → connection. Kept in sync with `by_connection`.
    by_player: HashMap<PlayerId, ConnectionId>,
    /// Connection → player. Kept in sync with `by_player`.
    by_connection: HashMap<ConnectionId, PlayerId>,
    /// Connection ids that have passed through `unbind` or were evicted.
    /// Closed is terminal: these ids are refused by `bind` forever.
    retired: HashSet<ConnectionId>,
}

impl PlayerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a player to a connection.
    ///
    /// If the player is already live on a *different* connection, that
    /// binding is removed in both directions, the old connection id is
    /// retired, and it is returned so the caller can force-disconnect
    /// it ("superseded by new login"). Rebinding the same pair is a
    /// no-op returning `None`.
    ///
    /// # Errors
    /// [`SessionError::ConnectionClosed`] if `connection_id` was
    /// already retired.
    pub fn bind(
        &mut self,
        player_id: PlayerId,
        connection_id: ConnectionId,
    ) -> Result<Option<ConnectionId>, SessionError> {
        if self.retired.contains(&connection_id) {
            return Err(SessionError::ConnectionClosed(connection_id));
        }

        let evicted = self
            .by_player
            .get(&player_id)
            .copied()
            .filter(|old| *old != connection_id);

        if let Some(old) = evicted {
            // Remove the stale pairing entirely before installing the
            // new one, so the old connection's later cleanup finds
            // nothing left to unbind.
            self.by_connection.remove(&old);
            self.retired.insert(old);
            tracing::info!(
                %player_id, old_connection = %old, new_connection = %connection_id,
                "superseded by new login"
            );
        }

        self.by_player.insert(player_id.clone(), connection_id);
        self.by_connection.insert(connection_id, player_id);
        Ok(evicted)
    }

    /// Removes the binding for a connection, both directions at once.
    ///
    /// Returns the player that was bound, or `None` if the connection
    /// was unknown or already unbound — calling `unbind` twice is a
    /// no-op the second time. The id is retired either way.
    pub fn unbind(
        &mut self,
        connection_id: ConnectionId,
    ) -> Option<PlayerId> {
        self.retired.insert(connection_id);
        let player_id = self.by_connection.remove(&connection_id)?;
        self.by_player.remove(&player_id);
        Some(player_id)
    }

    /// The connection a player is currently live on.
    pub fn connection_for(
        &self,
        player_id: &PlayerId,
    ) -> Option<ConnectionId> {
        self.by_player.get(player_id).copied()
    }

    /// The player a connection is carrying.
    pub fn player_for(&self, connection_id: ConnectionId) -> Option<&PlayerId> {
        self.by_connection.get(&connection_id)
    }

    /// Returns `true` if the connection id has been retired.
    pub fn is_retired(&self, connection_id: ConnectionId) -> bool {
        self.retired.contains(&connection_id)
    }

    /// Number of players currently bound.
    pub fn len(&self) -> usize {
        self.by_player.len()
    }

    /// Returns `true` if no players are bound.
    pub fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
