//! Room router: membership tables and best-effort fan-out.

use std::collections::{HashMap, HashSet};

use netward_protocol::{OutboundEvent, RoomId};
use netward_transport::ConnectionId;

use crate::{Outbound, OutboundSender, RoomError};

/// Tracks which connection is in which rooms and delivers events.
///
/// # Delivery semantics
///
/// `broadcast` delivers to the connections that are members at the
/// moment of the call — a join or leave racing the call may or may not
/// see the event. This is deliberate: game-world presence is itself
/// eventually consistent, so the router never promises more than a
/// snapshot.
///
/// `send_to` on an absent connection is a no-op, not an error: a late
/// event racing a disconnect must never blow up the caller.
///
/// # Concurrency note
///
/// Like the registry, the router uses plain maps and is owned behind a
/// single lock on the server context. Sends go through unbounded
/// channels and never await, so fan-out completes without dropping the
/// lock.
#[derive(Debug, Default)]
pub struct RoomRouter {
    /// Outbound channel for every live connection.
    senders: HashMap<ConnectionId, OutboundSender>,
    /// Room → members. Entries are removed when the last member leaves.
    members: HashMap<RoomId, HashSet<ConnectionId>>,
    /// Connection → rooms, the reverse index for `leave_all`.
    rooms_by_connection: HashMap<ConnectionId, HashSet<RoomId>>,
}

impl RoomRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection's outbound sender. Must happen before the
    /// connection can join rooms or receive targeted sends.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        sender: OutboundSender,
    ) {
        self.senders.insert(connection_id, sender);
    }

    /// Removes a connection entirely: all memberships, then the sender.
    ///
    /// Idempotent — deregistering an unknown connection does nothing.
    pub fn deregister(&mut self, connection_id: ConnectionId) {
        self.leave_all(connection_id);
        self.senders.remove(&connection_id);
    }

    /// Adds a connection to a room. Joining a room it is already in is
    /// a no-op.
    ///
    /// # Errors
    /// [`RoomError::UnknownConnection`] if the connection has no
    /// registered sender.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), RoomError> {
        if !self.senders.contains_key(&connection_id) {
            return Err(RoomError::UnknownConnection(connection_id));
        }

        self.members
            .entry(room_id.clone())
            .or_default()
            .insert(connection_id);
        self.rooms_by_connection
            .entry(connection_id)
            .or_default()
            .insert(room_id.clone());
        tracing::debug!(%connection_id, %room_id, "joined room");
        Ok(())
    }

    /// Removes a connection from a room. Returns `true` if it was a
    /// member.
    pub fn leave(
        &mut self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> bool {
        let was_member = match self.members.get_mut(room_id) {
            Some(set) => set.remove(&connection_id),
            None => false,
        };
        if was_member {
            if self.members.get(room_id).is_some_and(HashSet::is_empty) {
                self.members.remove(room_id);
            }
            if let Some(rooms) =
                self.rooms_by_connection.get_mut(&connection_id)
            {
                rooms.remove(room_id);
                if rooms.is_empty() {
                    self.rooms_by_connection.remove(&connection_id);
                }
            }
            tracing::debug!(%connection_id, %room_id, "left room");
        }
        was_member
    }

    /// Removes a connection from every room it is in, returning the
    /// rooms it left.
    pub fn leave_all(&mut self, connection_id: ConnectionId) -> Vec<RoomId> {
        let rooms: Vec<RoomId> = self
            .rooms_by_connection
            .remove(&connection_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        for room_id in &rooms {
            if let Some(set) = self.members.get_mut(room_id) {
                set.remove(&connection_id);
                if set.is_empty() {
                    self.members.remove(room_id);
                }
            }
        }
        rooms
    }

    /// Delivers an event to every current member of a room, optionally
    /// excluding one connection (typically the originator).
    ///
    /// Returns the number of connections the event was queued for. An
    /// empty or unknown room delivers to nobody — that is not an error.
    pub fn broadcast(
        &self,
        room_id: &RoomId,
        event: &OutboundEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let Some(members) = self.members.get(room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for conn_id in members {
            if Some(*conn_id) == exclude {
                continue;
            }
            if self.push(*conn_id, Outbound::Event(event.clone())) {
                delivered += 1;
            }
        }
        tracing::trace!(%room_id, delivered, "broadcast");
        delivered
    }

    /// Delivers an event to one connection. Returns `false` (silently)
    /// if the connection is absent or its receiver is gone.
    pub fn send_to(
        &self,
        connection_id: ConnectionId,
        event: OutboundEvent,
    ) -> bool {
        self.push(connection_id, Outbound::Event(event))
    }

    /// Tells a connection's writer to close with the given reason.
    /// Returns `false` if the connection is absent.
    pub fn kick(&self, connection_id: ConnectionId, reason: &str) -> bool {
        self.push(
            connection_id,
            Outbound::Close {
                reason: reason.to_string(),
            },
        )
    }

    /// Current members of a room. Empty if the room doesn't exist.
    pub fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.members
            .get(room_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms a connection is currently in.
    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<RoomId> {
        self.rooms_by_connection
            .get(&connection_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the connection is a member of the room.
    pub fn is_member(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
    ) -> bool {
        self.members
            .get(room_id)
            .is_some_and(|set| set.contains(&connection_id))
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    /// Queues an item on a connection's channel. Drops silently if the
    /// connection is unknown or its receiver has been closed.
    fn push(&self, connection_id: ConnectionId, item: Outbound) -> bool {
        match self.senders.get(&connection_id) {
            Some(sender) => sender.send(item).is_ok(),
            None => false,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
