//! # Netward
//!
//! The real-time connection layer of a multiplayer game server: accepts
//! persistent client connections, authenticates them against an external
//! identity token, binds each connection to a logical player identity,
//! enforces abuse limits, groups connections into broadcast scopes
//! ("rooms"), and routes named domain events to per-event handlers.
//!
//! Game logic stays outside: handlers registered on the [`Dispatcher`]
//! are the seam through which the rest of the server receives validated
//! events, and the push API on [`ServerContext`] (`broadcast_to_map`,
//! `send_to_player`, `online_player_count`) is how it talks back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netward::prelude::*;
//! use netward_session::MemoryStore;
//!
//! # struct MyVerifier;
//! # #[async_trait::async_trait]
//! # impl netward_session::TokenVerifier for MyVerifier {
//! #     async fn verify(&self, _: &str) -> Result<netward_session::TokenClaims, netward_session::SessionError> {
//! #         unimplemented!()
//! #     }
//! # }
//! # #[tokio::main]
//! # async fn main() -> Result<(), netward::GatewayError> {
//! let gateway = GatewayBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(Arc::new(MyVerifier), Arc::new(MemoryStore::new()))
//!     .await?;
//! gateway.run().await
//! # }
//! ```

mod config;
mod connection;
mod context;
mod dispatch;
mod error;
mod handlers;
mod server;
mod telemetry;

pub use config::GatewayConfig;
pub use context::ServerContext;
pub use dispatch::{Dispatcher, EventHandler, Peer};
pub use error::GatewayError;
pub use server::{Gateway, GatewayBuilder};
pub use telemetry::init_logging;

/// The types most servers need, in one import.
pub mod prelude {
    pub use crate::{
        Dispatcher, EventHandler, Gateway, GatewayBuilder, GatewayConfig,
        GatewayError, Peer, ServerContext,
    };
    pub use netward_limit::{RatePolicy, RateLimiter};
    pub use netward_protocol::{
        ChatChannel, EventEnvelope, MapId, OutboundEvent, PlayerId, RoomId,
    };
    pub use netward_room::RoomRouter;
    pub use netward_session::{
        MemoryStore, PlayerRegistry, SessionError, SessionRecord,
        SessionStore, TokenClaims, TokenVerifier,
    };
    pub use netward_transport::ConnectionId;
}
