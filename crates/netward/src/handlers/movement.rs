//! Movement events.

use async_trait::async_trait;
use netward_protocol::OutboundEvent;
use serde_json::Value;

use crate::{EventHandler, GatewayError, Peer, ServerContext};

/// `movement:request` — acknowledge and hand the request to the
/// simulation.
///
/// The gateway's job ends at the acknowledgment: movement validation
/// and resolution belong to the game-logic collaborator, which sees the
/// event through its own registered handler or by wrapping this one.
/// The ack echoes `requestId` verbatim so the client can correlate.
pub(crate) struct MovementRequest;

#[async_trait]
impl EventHandler for MovementRequest {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError> {
        tracing::trace!(player = %peer.player_id, "movement request");
        ctx.rooms.lock().await.send_to(
            peer.connection_id,
            OutboundEvent::MovementProcessing {
                request_id: data["requestId"].clone(),
            },
        );
        Ok(())
    }
}
