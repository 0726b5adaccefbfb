//! Integration tests for the gateway: full connection flow over real
//! WebSockets — authentication, supersede eviction, rate limiting,
//! rooms, presence, and the push API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use netward::prelude::*;
use netward_protocol::unix_ms;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Mock collaborators
// =========================================================================

/// Accepts `tok:<account>` as a valid token and `expired:<account>` as
/// a well-signed but stale one.
struct TestVerifier;

#[async_trait]
impl TokenVerifier for TestVerifier {
    async fn verify(&self, token: &str) -> Result<TokenClaims, SessionError> {
        if let Some(account) = token.strip_prefix("tok:") {
            return Ok(TokenClaims {
                account_id: account.to_string(),
                expires_at_ms: unix_ms() + 3_600_000,
            });
        }
        if let Some(account) = token.strip_prefix("expired:") {
            return Ok(TokenClaims {
                account_id: account.to_string(),
                expires_at_ms: 1,
            });
        }
        Err(SessionError::AuthFailed("unrecognized token".into()))
    }
}

/// A store that is always down.
struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn put(
        &self,
        _player_id: &PlayerId,
        _record: SessionRecord,
        _ttl: Duration,
    ) -> Result<(), SessionError> {
        Err(SessionError::StoreUnavailable("store offline".into()))
    }

    async fn get(
        &self,
        _player_id: &PlayerId,
    ) -> Result<Option<SessionRecord>, SessionError> {
        Err(SessionError::StoreUnavailable("store offline".into()))
    }

    async fn delete(
        &self,
        _player_id: &PlayerId,
    ) -> Result<(), SessionError> {
        Err(SessionError::StoreUnavailable("store offline".into()))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Seeds the store with login-service records for the given players.
async fn seed_store(players: &[PlayerId]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for player in players {
        let record = SessionRecord::new(
            player.clone(),
            ConnectionId::new(0),
            Duration::from_secs(300),
        );
        store
            .put(player, record, Duration::from_secs(300))
            .await
            .expect("seed should succeed");
    }
    store
}

/// Starts a gateway on a random port and returns its address and
/// context.
async fn start_server(
    builder: GatewayBuilder,
    store: Arc<dyn SessionStore>,
) -> (String, Arc<ServerContext>) {
    let gateway = builder
        .bind("127.0.0.1:0")
        .build(Arc::new(TestVerifier), store)
        .await
        .expect("gateway should build");

    let addr = gateway
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let ctx = gateway.context();

    tokio::spawn(async move {
        let _ = gateway.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, ctx)
}

/// Default server: seeded store for accounts A1 and A2 (character C1).
async fn start_default_server() -> (String, Arc<ServerContext>) {
    let store = seed_store(&[
        PlayerId::new("A1", "C1"),
        PlayerId::new("A2", "C1"),
    ])
    .await;
    start_server(GatewayBuilder::new(), store).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_event(ws: &mut ClientWs, event: &str, data: Value) {
    let frame = json!({"event": event, "data": data}).to_string();
    ws.send(Message::Text(frame.into())).await.expect("send");
}

/// Receives the next event frame. Returns `None` on close.
async fn recv_event(ws: &mut ClientWs) -> Option<(String, Value)> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")?
            .ok()?;
        match msg {
            Message::Binary(data) => {
                let value: Value =
                    serde_json::from_slice(&data).expect("decode");
                return Some((
                    value["event"].as_str().expect("event name").to_string(),
                    value["data"].clone(),
                ));
            }
            Message::Text(text) => {
                let value: Value =
                    serde_json::from_str(&text).expect("decode");
                return Some((
                    value["event"].as_str().expect("event name").to_string(),
                    value["data"].clone(),
                ));
            }
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Authenticates and returns the `auth:success` payload.
async fn authenticate(
    ws: &mut ClientWs,
    token: &str,
    character: &str,
) -> Value {
    send_event(
        ws,
        "authenticate",
        json!({"token": token, "characterId": character}),
    )
    .await;
    let (event, data) = recv_event(ws).await.expect("expected auth reply");
    assert_eq!(event, "auth:success", "auth failed: {data:?}");
    data
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_authenticate_success() {
    let (addr, ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;

    let data = authenticate(&mut ws, "tok:A1", "C1").await;

    assert_eq!(data["playerId"], "A1:C1");
    assert_eq!(data["characterId"], "C1");
    assert_eq!(ctx.online_player_count().await, 1);
}

#[tokio::test]
async fn test_authenticate_bad_token_closes_connection() {
    let (addr, ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        "authenticate",
        json!({"token": "garbage", "characterId": "C1"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected reply");
    assert_eq!(event, "auth:error");
    assert!(data["message"].as_str().unwrap().contains("authentication"));

    // The server closes after an auth failure.
    assert!(recv_event(&mut ws).await.is_none());
    assert_eq!(ctx.online_player_count().await, 0);
}

#[tokio::test]
async fn test_authenticate_expired_token_rejected() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        "authenticate",
        json!({"token": "expired:A1", "characterId": "C1"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected reply");
    assert_eq!(event, "auth:error");
    assert!(data["message"].as_str().unwrap().contains("expired"));
}

#[tokio::test]
async fn test_authenticate_without_seeded_session_rejected() {
    // Valid token, but the login service never created a session.
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        "authenticate",
        json!({"token": "tok:A9", "characterId": "C1"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected reply");
    assert_eq!(event, "auth:error");
    assert!(data["message"].as_str().unwrap().contains("no session"));
}

#[tokio::test]
async fn test_authenticate_missing_fields_rejected() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;

    send_event(&mut ws, "authenticate", json!({"token": "tok:A1"})).await;

    let (event, _) = recv_event(&mut ws).await.expect("expected reply");
    assert_eq!(event, "auth:error");
}

#[tokio::test]
async fn test_store_unavailable_fails_closed() {
    let (addr, ctx) =
        start_server(GatewayBuilder::new(), Arc::new(FailingStore)).await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        "authenticate",
        json!({"token": "tok:A1", "characterId": "C1"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected reply");
    assert_eq!(event, "auth:error");
    assert!(data["message"].as_str().unwrap().contains("unavailable"));
    assert_eq!(ctx.online_player_count().await, 0);
}

#[tokio::test]
async fn test_unauthenticated_event_gets_error_without_handler() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;

    send_event(&mut ws, "movement:request", json!({"requestId": 1})).await;

    let (event, data) = recv_event(&mut ws).await.expect("expected reply");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "Not authenticated");
}

// =========================================================================
// Supersede: at most one live connection per player
// =========================================================================

#[tokio::test]
async fn test_second_login_supersedes_first() {
    let (addr, ctx) = start_default_server().await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;
    assert_eq!(ctx.online_player_count().await, 1);

    let mut ws2 = connect(&addr).await;
    authenticate(&mut ws2, "tok:A1", "C1").await;

    // The first connection is force-closed...
    assert!(
        recv_event(&mut ws1).await.is_none(),
        "superseded connection should be closed"
    );
    // ...and exactly one player remains online.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.online_player_count().await, 1);

    // The surviving connection still works.
    send_event(&mut ws2, "ping", json!({})).await;
    let (event, _) = recv_event(&mut ws2).await.expect("expected pong");
    assert_eq!(event, "pong");
}

#[tokio::test]
async fn test_same_account_different_characters_coexist() {
    let store = seed_store(&[
        PlayerId::new("A1", "C1"),
        PlayerId::new("A1", "C2"),
    ])
    .await;
    let (addr, ctx) = start_server(GatewayBuilder::new(), store).await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;
    let mut ws2 = connect(&addr).await;
    authenticate(&mut ws2, "tok:A1", "C2").await;

    assert_eq!(ctx.online_player_count().await, 2);
}

// =========================================================================
// Disconnect cleanup
// =========================================================================

#[tokio::test]
async fn test_disconnect_cleans_up_session() {
    let store = seed_store(&[PlayerId::new("A1", "C1")]).await;
    let (addr, ctx) = start_server(
        GatewayBuilder::new(),
        Arc::clone(&store) as Arc<dyn SessionStore>,
    )
    .await;

    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;
    assert_eq!(ctx.online_player_count().await, 1);

    ws.close(None).await.expect("close");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(ctx.online_player_count().await, 0);
    let record = store.get(&PlayerId::new("A1", "C1")).await.unwrap();
    assert!(record.is_none(), "session record should be deleted");
}

// =========================================================================
// Rate limiting
// =========================================================================

#[tokio::test]
async fn test_chat_rate_limit_rejects_the_31st_message() {
    let builder = GatewayBuilder::new().action_rate(
        "chat:message",
        RatePolicy::per(Duration::from_secs(60), 30),
    );
    let store = seed_store(&[PlayerId::new("A1", "C1")]).await;
    let (addr, _ctx) = start_server(builder, store).await;

    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    for i in 0..31 {
        send_event(
            &mut ws,
            "chat:message",
            json!({"channel": {"kind": "general"}, "message": format!("m{i}")}),
        )
        .await;
    }

    // The sender is in the general channel, so the first 30 come back
    // as broadcasts; the 31st is rejected.
    for i in 0..30 {
        let (event, data) =
            recv_event(&mut ws).await.expect("expected broadcast");
        assert_eq!(event, "chat:message", "message {i}");
        assert_eq!(data["message"], format!("m{i}"));
    }
    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "chat:error");
    assert_eq!(data["message"], "Too many requests");
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test]
async fn test_chat_message_reaches_other_players() {
    let (addr, _ctx) = start_default_server().await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;
    let mut ws2 = connect(&addr).await;
    authenticate(&mut ws2, "tok:A2", "C1").await;

    send_event(
        &mut ws1,
        "chat:message",
        json!({"channel": {"kind": "general"}, "message": "hello"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws2).await.expect("expected chat");
    assert_eq!(event, "chat:message");
    assert_eq!(data["playerId"], "A1:C1");
    assert_eq!(data["channel"]["kind"], "general");
    assert_eq!(data["message"], "hello");
    assert!(data["timestamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_chat_message_to_unjoined_channel_rejected() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(
        &mut ws,
        "chat:message",
        json!({"channel": {"kind": "party", "party_id": "P1"}, "message": "hi"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "chat:error");
    assert_eq!(data["message"], "Not in that channel");
}

#[tokio::test]
async fn test_chat_private_delivered_to_target() {
    let (addr, _ctx) = start_default_server().await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;
    let mut ws2 = connect(&addr).await;
    authenticate(&mut ws2, "tok:A2", "C1").await;

    send_event(
        &mut ws1,
        "chat:private",
        json!({"targetPlayerId": "A2:C1", "message": "psst"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws2).await.expect("expected whisper");
    assert_eq!(event, "chat:private");
    assert_eq!(data["from"], "A1:C1");
    assert_eq!(data["message"], "psst");
}

#[tokio::test]
async fn test_chat_private_to_offline_player_reports_sender() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(
        &mut ws,
        "chat:private",
        json!({"targetPlayerId": "A2:C1", "message": "anyone?"}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "chat:error");
    assert_eq!(data["message"], "Player not online");
}

#[tokio::test]
async fn test_chat_whisper_channel_routes_like_private() {
    let (addr, _ctx) = start_default_server().await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;
    let mut ws2 = connect(&addr).await;
    authenticate(&mut ws2, "tok:A2", "C1").await;

    send_event(
        &mut ws1,
        "chat:message",
        json!({
            "channel": {"kind": "whisper", "target": "A2:C1"},
            "message": "via channel"
        }),
    )
    .await;

    let (event, data) = recv_event(&mut ws2).await.expect("expected whisper");
    assert_eq!(event, "chat:private");
    assert_eq!(data["message"], "via channel");
}

#[tokio::test]
async fn test_chat_message_missing_fields_rejected() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(&mut ws, "chat:message", json!({"message": "no channel"}))
        .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "chat:error");
    assert!(data["message"].as_str().unwrap().contains("channel"));
}

// =========================================================================
// Map presence
// =========================================================================

#[tokio::test]
async fn test_map_enter_and_leave_announce_presence() {
    let (addr, _ctx) = start_default_server().await;

    // B settles on map 5 first.
    let mut ws_b = connect(&addr).await;
    authenticate(&mut ws_b, "tok:A2", "C1").await;
    send_event(&mut ws_b, "map:enter", json!({"mapId": 5})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A enters: B sees the spawn, A sees nothing (originator excluded).
    let mut ws_a = connect(&addr).await;
    authenticate(&mut ws_a, "tok:A1", "C1").await;
    send_event(&mut ws_a, "map:enter", json!({"mapId": 5})).await;

    let (event, data) = recv_event(&mut ws_b).await.expect("expected spawn");
    assert_eq!(event, "entity:spawn");
    assert_eq!(data["playerId"], "A1:C1");
    assert_eq!(data["mapId"], 5);

    // A leaves: B sees the despawn.
    send_event(&mut ws_a, "map:leave", json!({"mapId": 5})).await;

    let (event, data) =
        recv_event(&mut ws_b).await.expect("expected despawn");
    assert_eq!(event, "entity:despawn");
    assert_eq!(data["playerId"], "A1:C1");
    assert_eq!(data["mapId"], 5);
}

#[tokio::test]
async fn test_disconnect_despawns_from_maps() {
    let (addr, _ctx) = start_default_server().await;

    let mut ws_b = connect(&addr).await;
    authenticate(&mut ws_b, "tok:A2", "C1").await;
    send_event(&mut ws_b, "map:enter", json!({"mapId": 5})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws_a = connect(&addr).await;
    authenticate(&mut ws_a, "tok:A1", "C1").await;
    send_event(&mut ws_a, "map:enter", json!({"mapId": 5})).await;
    let (event, _) = recv_event(&mut ws_b).await.expect("spawn");
    assert_eq!(event, "entity:spawn");

    // A drops without a map:leave.
    ws_a.close(None).await.expect("close");

    let (event, data) =
        recv_event(&mut ws_b).await.expect("expected despawn");
    assert_eq!(event, "entity:despawn");
    assert_eq!(data["playerId"], "A1:C1");
}

#[tokio::test]
async fn test_map_leave_without_enter_reports_error() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(&mut ws, "map:leave", json!({"mapId": 9})).await;

    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "Not on that map");
}

// =========================================================================
// Movement / combat / ping
// =========================================================================

#[tokio::test]
async fn test_movement_request_acknowledged() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(
        &mut ws,
        "movement:request",
        json!({"requestId": "r-77", "x": 10, "y": 20}),
    )
    .await;

    let (event, data) = recv_event(&mut ws).await.expect("expected ack");
    assert_eq!(event, "movement:processing");
    assert_eq!(data["requestId"], "r-77");
}

#[tokio::test]
async fn test_combat_action_acknowledged() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(&mut ws, "combat:action", json!({"actionId": 3})).await;

    let (event, data) = recv_event(&mut ws).await.expect("expected ack");
    assert_eq!(event, "combat:processing");
    assert_eq!(data["actionId"], 3);
}

#[tokio::test]
async fn test_ping_pong() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(&mut ws, "ping", json!({})).await;

    let (event, data) = recv_event(&mut ws).await.expect("expected pong");
    assert_eq!(event, "pong");
    assert!(data["timestamp"].as_u64().unwrap() > 0);
}

// =========================================================================
// Robustness
// =========================================================================

#[tokio::test]
async fn test_malformed_frame_keeps_connection_alive() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");
    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "Malformed event");

    // The connection still works afterwards.
    send_event(&mut ws, "ping", json!({})).await;
    let (event, _) = recv_event(&mut ws).await.expect("expected pong");
    assert_eq!(event, "pong");
}

#[tokio::test]
async fn test_unknown_event_reports_error() {
    let (addr, _ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    send_event(&mut ws, "teleport", json!({})).await;

    let (event, data) = recv_event(&mut ws).await.expect("expected error");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "Unknown event: teleport");
}

#[tokio::test]
async fn test_capacity_admission_rejects_excess_connections() {
    let mut config = GatewayConfig::default();
    config.max_connections = 1;
    let store = seed_store(&[PlayerId::new("A1", "C1")]).await;
    let (addr, _ctx) =
        start_server(GatewayBuilder::new().config(config), store).await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;

    let mut ws2 = connect(&addr).await;
    let (event, data) = recv_event(&mut ws2).await.expect("expected reply");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "Server full");
    assert!(recv_event(&mut ws2).await.is_none(), "should be closed");
}

#[tokio::test]
async fn test_auth_timeout_closes_silent_connection() {
    let mut config = GatewayConfig::default();
    config.auth_timeout = Duration::from_millis(100);
    let store = seed_store(&[]).await;
    let (addr, _ctx) =
        start_server(GatewayBuilder::new().config(config), store).await;

    let mut ws = connect(&addr).await;
    // Say nothing; the server should give up on us.
    assert!(recv_event(&mut ws).await.is_none(), "should be closed");
}

// =========================================================================
// Push API
// =========================================================================

#[tokio::test]
async fn test_push_api_send_to_player() {
    let (addr, ctx) = start_default_server().await;
    let mut ws = connect(&addr).await;
    authenticate(&mut ws, "tok:A1", "C1").await;

    let delivered = ctx
        .send_to_player(
            &PlayerId::new("A1", "C1"),
            OutboundEvent::Error {
                message: "maintenance in 5 minutes".into(),
            },
        )
        .await;
    assert!(delivered);

    let (event, data) = recv_event(&mut ws).await.expect("expected push");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "maintenance in 5 minutes");
}

#[tokio::test]
async fn test_push_api_send_to_offline_player_is_nonfatal() {
    let (_addr, ctx) = start_default_server().await;

    let delivered = ctx
        .send_to_player(
            &PlayerId::new("A2", "C1"),
            OutboundEvent::Pong { timestamp: 1 },
        )
        .await;
    assert!(!delivered);
}

#[tokio::test]
async fn test_push_api_broadcast_to_map() {
    let (addr, ctx) = start_default_server().await;

    let mut ws1 = connect(&addr).await;
    authenticate(&mut ws1, "tok:A1", "C1").await;
    send_event(&mut ws1, "map:enter", json!({"mapId": 7})).await;
    let mut ws2 = connect(&addr).await;
    authenticate(&mut ws2, "tok:A2", "C1").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Only the player on map 7 receives the broadcast.
    let delivered = ctx
        .broadcast_to_map(
            MapId(7),
            OutboundEvent::Error {
                message: "the ground shakes".into(),
            },
        )
        .await;
    assert_eq!(delivered, 1);

    let (event, data) = recv_event(&mut ws1).await.expect("expected push");
    assert_eq!(event, "error");
    assert_eq!(data["message"], "the ground shakes");
}
