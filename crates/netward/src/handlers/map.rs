//! Map presence events.
//!
//! Entering a map joins its room and announces the player to everyone
//! already there; leaving reverses both. The join/announce pair runs
//! under one router lock so a concurrent broadcast sees either the old
//! membership or the new one, never a half-applied state.

use async_trait::async_trait;
use netward_protocol::{unix_ms, MapId, OutboundEvent, RoomId};
use serde_json::Value;

use crate::{EventHandler, GatewayError, Peer, ServerContext};

/// `map:enter` — join the map room, spawn for the others.
pub(crate) struct MapEnter;

#[async_trait]
impl EventHandler for MapEnter {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError> {
        let Some(map_id) = parse_map_id(ctx, peer, data).await else {
            return Ok(());
        };
        let room = RoomId::map(map_id);

        let mut rooms = ctx.rooms.lock().await;
        rooms.join(peer.connection_id, room.clone())?;
        rooms.broadcast(
            &room,
            &OutboundEvent::EntitySpawn {
                player_id: peer.player_id.clone(),
                map_id,
                timestamp: unix_ms(),
            },
            Some(peer.connection_id),
        );
        drop(rooms);

        tracing::debug!(player = %peer.player_id, %map_id, "entered map");
        Ok(())
    }
}

/// `map:leave` — leave the map room, despawn for the others.
pub(crate) struct MapLeave;

#[async_trait]
impl EventHandler for MapLeave {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError> {
        let Some(map_id) = parse_map_id(ctx, peer, data).await else {
            return Ok(());
        };
        let room = RoomId::map(map_id);

        let mut rooms = ctx.rooms.lock().await;
        if !rooms.leave(peer.connection_id, &room) {
            rooms.send_to(
                peer.connection_id,
                OutboundEvent::Error {
                    message: "Not on that map".into(),
                },
            );
            return Ok(());
        }
        // The leaver is already out of the room; no exclusion needed.
        rooms.broadcast(
            &room,
            &OutboundEvent::EntityDespawn {
                player_id: peer.player_id.clone(),
                map_id,
                timestamp: unix_ms(),
            },
            None,
        );
        drop(rooms);

        tracing::debug!(player = %peer.player_id, %map_id, "left map");
        Ok(())
    }
}

async fn parse_map_id(
    ctx: &ServerContext,
    peer: &Peer,
    data: &Value,
) -> Option<MapId> {
    match data["mapId"].as_u64() {
        Some(id) => Some(MapId(id)),
        None => {
            ctx.rooms.lock().await.send_to(
                peer.connection_id,
                OutboundEvent::Error {
                    message: "mapId must be a number".into(),
                },
            );
            None
        }
    }
}
