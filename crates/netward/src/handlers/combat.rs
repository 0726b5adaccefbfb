//! Combat events.

use async_trait::async_trait;
use netward_protocol::OutboundEvent;
use serde_json::Value;

use crate::{EventHandler, GatewayError, Peer, ServerContext};

/// `combat:action` — acknowledge and forward to combat resolution.
pub(crate) struct CombatAction;

#[async_trait]
impl EventHandler for CombatAction {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError> {
        tracing::trace!(player = %peer.player_id, "combat action");
        ctx.rooms.lock().await.send_to(
            peer.connection_id,
            OutboundEvent::CombatProcessing {
                action_id: data["actionId"].clone(),
            },
        );
        Ok(())
    }
}
