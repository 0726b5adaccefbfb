//! Per-connection task: admission, authentication, event loop, cleanup.
//!
//! Each accepted connection gets its own Tokio task running this flow:
//!
//!   1. Admission checks (connect rate, capacity) — failing one closes
//!      the connection before any event is accepted
//!   2. Register the outbound channel and spawn the writer task
//!   3. Wait for `authenticate` — verify token, confirm session truth,
//!      bind (evicting a superseded login), refresh the store
//!   4. Loop: receive events → dispatch
//!   5. Cleanup: unbind, despawn, drop memberships and limiter windows
//!
//! The connection's state machine is `Pending → Authenticating →
//! Authenticated → Closed`; `player` being `None`/`Some` encodes the
//! middle states and `closed` latches the terminal one. Cleanup is
//! idempotent and guarded by that latch, so a forced kick racing a
//! client disconnect runs it exactly once, and nothing mutates registry
//! or room state for this connection afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netward_protocol::{
    unix_ms, ChatChannel, Codec, EventEnvelope, OutboundEvent, PlayerId,
    RoomId,
};
use netward_room::Outbound;
use netward_session::{SessionError, SessionRecord};
use netward_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::{Dispatcher, GatewayError, ServerContext};

/// Cleanup backstop: if the task unwinds without reaching the explicit
/// cleanup call, `Drop` fires it instead. Since `Drop` is synchronous,
/// the async work runs in a fire-and-forget task.
struct CleanupGuard {
    ctx: Arc<ServerContext>,
    conn_id: ConnectionId,
    closed: Arc<AtomicBool>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let ctx = Arc::clone(&self.ctx);
        let conn_id = self.conn_id;
        let closed = Arc::clone(&self.closed);
        tokio::spawn(async move {
            cleanup(&ctx, conn_id, &closed).await;
        });
    }
}

/// The ordered admission chain run at connect time, before any event
/// is accepted. Each check can short-circuit with a rejection reason.
enum AdmissionCheck {
    /// Per-IP connect window. A per-connection key would never trip
    /// here — every connect arrives with a fresh id.
    ConnectRate,
    /// Hard cap on registered connections.
    Capacity,
}

impl AdmissionCheck {
    const CHAIN: [AdmissionCheck; 2] = [Self::ConnectRate, Self::Capacity];

    async fn run(
        &self,
        ctx: &ServerContext,
        conn: &WebSocketConnection,
    ) -> Result<(), &'static str> {
        match self {
            Self::ConnectRate => {
                let key = match conn.remote_addr() {
                    Some(addr) => format!("accept:{}", addr.ip()),
                    None => format!("accept:{}", conn.id()),
                };
                if ctx
                    .conn_limiter
                    .allow_policy(&key, &ctx.config.accept_rate)
                    .await
                {
                    Ok(())
                } else {
                    Err("Too many connection attempts")
                }
            }
            Self::Capacity => {
                let count = ctx.rooms.lock().await.connection_count();
                if count < ctx.config.max_connections {
                    Ok(())
                } else {
                    Err("Server full")
                }
            }
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    ctx: Arc<ServerContext>,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), GatewayError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Admission, before any event is accepted ---
    for check in AdmissionCheck::CHAIN {
        if let Err(reason) = check.run(&ctx, &conn).await {
            tracing::info!(%conn_id, reason, "connection rejected at admission");
            send_raw(
                &conn,
                &ctx,
                &OutboundEvent::Error {
                    message: reason.into(),
                },
            )
            .await;
            let _ = conn.close(reason).await;
            return Ok(());
        }
    }

    // --- Outbound path: everything reaches the client through here ---
    let (tx, rx) = mpsc::unbounded_channel();
    ctx.rooms.lock().await.register(conn_id, tx);

    let closed = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(Notify::new());
    let _writer =
        spawn_writer(conn.clone(), Arc::clone(&ctx), rx, Arc::clone(&shutdown));
    let _guard = CleanupGuard {
        ctx: Arc::clone(&ctx),
        conn_id,
        closed: Arc::clone(&closed),
    };

    // --- Event loop ---
    let mut player: Option<PlayerId> = None;

    loop {
        let limit = if player.is_none() {
            ctx.config.auth_timeout
        } else {
            ctx.config.idle_timeout
        };

        let data = tokio::select! {
            // The writer is gone (kick processed, or the socket died on
            // send); stop reading immediately instead of waiting for
            // the peer's close frame.
            _ = shutdown.notified() => break,
            result = tokio::time::timeout(limit, conn.recv()) => match result {
                Ok(Ok(Some(data))) => data,
                Ok(Ok(None)) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break;
                }
                Ok(Err(e)) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break;
                }
                Err(_) => {
                    let reason = if player.is_none() {
                        "authentication timed out"
                    } else {
                        "idle timeout"
                    };
                    tracing::info!(%conn_id, reason, "closing connection");
                    let _ = conn.close(reason).await;
                    break;
                }
            },
        };

        // Raw-traffic window, one admission per frame.
        if !ctx
            .conn_limiter
            .allow_policy(&conn_id.to_string(), &ctx.config.connection_rate)
            .await
        {
            ctx.rooms.lock().await.send_to(
                conn_id,
                OutboundEvent::Error {
                    message: "Too many requests".into(),
                },
            );
            continue;
        }

        let envelope: EventEnvelope = match ctx.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "malformed frame");
                ctx.rooms.lock().await.send_to(
                    conn_id,
                    OutboundEvent::Error {
                        message: "Malformed event".into(),
                    },
                );
                continue;
            }
        };

        if envelope.event == "authenticate" {
            if player.is_some() {
                ctx.rooms.lock().await.send_to(
                    conn_id,
                    OutboundEvent::Error {
                        message: "Already authenticated".into(),
                    },
                );
                continue;
            }
            match authenticate(&ctx, conn_id, &envelope).await {
                Ok(player_id) => player = Some(player_id),
                Err(e) => {
                    tracing::info!(%conn_id, error = %e, "authentication failed");
                    let rooms = ctx.rooms.lock().await;
                    rooms.send_to(
                        conn_id,
                        OutboundEvent::AuthError {
                            message: e.to_string(),
                        },
                    );
                    rooms.kick(conn_id, "authentication failed");
                    // The writer drains the error, closes, and signals
                    // shutdown; the next select iteration exits.
                }
            }
            continue;
        }

        dispatcher
            .dispatch(&ctx, conn_id, player.as_ref(), envelope)
            .await;
    }

    cleanup(&ctx, conn_id, &closed).await;
    Ok(())
}

/// Runs the authentication sequence for an `authenticate` envelope.
///
/// Fail-closed throughout: any verifier or store trouble aborts before
/// a partial binding exists, and a store failure after binding rolls
/// the binding back.
async fn authenticate(
    ctx: &ServerContext,
    conn_id: ConnectionId,
    envelope: &EventEnvelope,
) -> Result<PlayerId, SessionError> {
    if !envelope
        .missing_fields(&["token", "characterId"])
        .is_empty()
    {
        return Err(SessionError::AuthFailed(
            "missing token or characterId".into(),
        ));
    }
    let token = envelope.data["token"].as_str().ok_or_else(|| {
        SessionError::AuthFailed("token must be a string".into())
    })?;
    let character_id =
        envelope.data["characterId"].as_str().ok_or_else(|| {
            SessionError::AuthFailed("characterId must be a string".into())
        })?;

    let claims = ctx.verifier.verify(token).await?;
    if claims.expires_at_ms <= unix_ms() {
        return Err(SessionError::AuthFailed("token expired".into()));
    }
    let player_id = PlayerId::new(claims.account_id, character_id);

    // The login service seeds the session; no record, no entry.
    if ctx.store.get(&player_id).await?.is_none() {
        return Err(SessionError::SessionMissing(player_id));
    }

    let evicted = ctx
        .registry
        .lock()
        .await
        .bind(player_id.clone(), conn_id)?;
    if let Some(old) = evicted {
        ctx.rooms.lock().await.kick(old, "superseded by new login");
    }

    // Refresh session truth with the new connection and TTL. A store
    // failure here still fails authentication closed — roll back the
    // binding first.
    let ttl = ctx.config.session_ttl;
    let record = SessionRecord::new(player_id.clone(), conn_id, ttl);
    if let Err(e) = ctx.store.put(&player_id, record, ttl).await {
        ctx.registry.lock().await.unbind(conn_id);
        return Err(e);
    }

    {
        let mut rooms = ctx.rooms.lock().await;
        rooms
            .join(conn_id, RoomId::private(&player_id))
            .map_err(|_| {
                SessionError::AuthFailed(
                    "connection closed during authentication".into(),
                )
            })?;
        // Global channels every player is in; guild/party membership
        // is driven by game logic later.
        for channel in [ChatChannel::General, ChatChannel::Trade] {
            if let Some(room) = RoomId::channel(&channel) {
                let _ = rooms.join(conn_id, room);
            }
        }
        rooms.send_to(
            conn_id,
            OutboundEvent::AuthSuccess {
                player_id: player_id.clone(),
                character_id: character_id.to_string(),
            },
        );
    }

    tracing::info!(%conn_id, %player_id, "player authenticated");
    Ok(player_id)
}

/// Tears down everything the connection owns. Idempotent: the `closed`
/// latch makes the second and later calls no-ops.
pub(crate) async fn cleanup(
    ctx: &ServerContext,
    conn_id: ConnectionId,
    closed: &AtomicBool,
) {
    if closed.swap(true, Ordering::SeqCst) {
        return;
    }

    // If this connection was superseded, the new login already owns the
    // binding and the session record: unbind returns None and both are
    // left untouched.
    let player = ctx.registry.lock().await.unbind(conn_id);

    let mut rooms = ctx.rooms.lock().await;
    let left = rooms.leave_all(conn_id);
    if let Some(player_id) = &player {
        // Announce the disappearance on every map the player was on.
        for room in &left {
            if let Some(map_id) = room.as_map() {
                rooms.broadcast(
                    room,
                    &OutboundEvent::EntityDespawn {
                        player_id: player_id.clone(),
                        map_id,
                        timestamp: unix_ms(),
                    },
                    None,
                );
            }
        }
    }
    rooms.deregister(conn_id);
    drop(rooms);

    if let Some(player_id) = &player {
        // Non-fatal: a record we fail to delete expires via TTL.
        if let Err(e) = ctx.store.delete(player_id).await {
            tracing::warn!(
                %conn_id, %player_id, error = %e,
                "session store cleanup failed; record will expire via TTL"
            );
        }
    }

    ctx.conn_limiter.release(&conn_id.to_string()).await;
    ctx.action_limiter
        .release_prefix(&format!("{conn_id}:"))
        .await;
    tracing::info!(%conn_id, "connection cleaned up");
}

/// Spawns the writer task: drains the outbound channel onto the socket,
/// in order, and closes the socket on [`Outbound::Close`]. Signals
/// `shutdown` on exit so the reader stops too.
fn spawn_writer(
    conn: WebSocketConnection,
    ctx: Arc<ServerContext>,
    mut rx: UnboundedReceiver<Outbound>,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Event(event) => {
                    let bytes = match ctx.codec.encode(&event) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "failed to encode outbound event"
                            );
                            continue;
                        }
                    };
                    if conn.send(&bytes).await.is_err() {
                        break;
                    }
                }
                Outbound::Close { reason } => {
                    let _ = conn.close(&reason).await;
                    break;
                }
            }
        }
        shutdown.notify_one();
    })
}

/// Sends an event directly on the socket, bypassing the router. Only
/// used before the writer task exists (admission rejections).
async fn send_raw(
    conn: &WebSocketConnection,
    ctx: &ServerContext,
    event: &OutboundEvent,
) {
    if let Ok(bytes) = ctx.codec.encode(event) {
        let _ = conn.send(&bytes).await;
    }
}
