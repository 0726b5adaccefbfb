//! Chat events: channel messages and direct whispers.

use async_trait::async_trait;
use netward_protocol::{
    unix_ms, ChatChannel, OutboundEvent, PlayerId, RoomId,
};
use serde_json::Value;

use crate::{EventHandler, GatewayError, Peer, ServerContext};

/// Longest accepted chat message, in bytes.
const MAX_MESSAGE_LEN: usize = 512;

/// `chat:message` — fan a message out to a channel's room.
///
/// The channel is a tagged variant; a whisper channel routes
/// point-to-point like `chat:private` instead of through a room.
pub(crate) struct ChatMessage;

#[async_trait]
impl EventHandler for ChatMessage {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError> {
        let Ok(channel) =
            serde_json::from_value::<ChatChannel>(data["channel"].clone())
        else {
            chat_err(ctx, peer, "Invalid channel").await;
            return Ok(());
        };
        let Some(message) = valid_message(ctx, peer, data).await else {
            return Ok(());
        };

        match channel {
            ChatChannel::System => {
                chat_err(ctx, peer, "Cannot send to the system channel")
                    .await;
            }
            ChatChannel::Whisper { target } => {
                deliver_whisper(ctx, peer, &target, message).await;
            }
            channel => {
                // Non-whisper channels all have a backing room.
                let room = RoomId::channel(&channel)
                    .expect("non-whisper channel has a room");
                let rooms = ctx.rooms.lock().await;
                if !rooms.is_member(peer.connection_id, &room) {
                    drop(rooms);
                    chat_err(ctx, peer, "Not in that channel").await;
                    return Ok(());
                }
                rooms.broadcast(
                    &room,
                    &OutboundEvent::ChatMessage {
                        player_id: peer.player_id.clone(),
                        channel,
                        message,
                        timestamp: unix_ms(),
                    },
                    None,
                );
            }
        }
        Ok(())
    }
}

/// `chat:private` — a direct message addressed by player id.
pub(crate) struct ChatPrivate;

#[async_trait]
impl EventHandler for ChatPrivate {
    async fn handle(
        &self,
        ctx: &ServerContext,
        peer: &Peer,
        data: &Value,
    ) -> Result<(), GatewayError> {
        let Ok(target) = serde_json::from_value::<PlayerId>(
            data["targetPlayerId"].clone(),
        ) else {
            chat_err(ctx, peer, "Invalid target player id").await;
            return Ok(());
        };
        let Some(message) = valid_message(ctx, peer, data).await else {
            return Ok(());
        };

        deliver_whisper(ctx, peer, &target, message).await;
        Ok(())
    }
}

/// Resolves the target through the registry and delivers. An offline or
/// just-disconnected target is reported to the sender, never raised.
async fn deliver_whisper(
    ctx: &ServerContext,
    peer: &Peer,
    target: &PlayerId,
    message: String,
) {
    let delivered = ctx
        .send_to_player(
            target,
            OutboundEvent::ChatPrivate {
                from: peer.player_id.clone(),
                message,
                timestamp: unix_ms(),
            },
        )
        .await;

    if !delivered {
        chat_err(ctx, peer, "Player not online").await;
    }
}

/// Pulls the message text out of the payload, enforcing type and
/// length. Reports the failure itself and returns `None` if invalid.
async fn valid_message(
    ctx: &ServerContext,
    peer: &Peer,
    data: &Value,
) -> Option<String> {
    let Some(message) = data["message"].as_str() else {
        chat_err(ctx, peer, "Message must be a string").await;
        return None;
    };
    if message.is_empty() || message.len() > MAX_MESSAGE_LEN {
        chat_err(ctx, peer, "Message length out of range").await;
        return None;
    }
    Some(message.to_string())
}

async fn chat_err(ctx: &ServerContext, peer: &Peer, message: &str) {
    ctx.rooms.lock().await.send_to(
        peer.connection_id,
        OutboundEvent::ChatError {
            message: message.into(),
        },
    );
}
