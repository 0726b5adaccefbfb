//! Player identity and session truth for Netward.
//!
//! This crate owns the question "who is connected right now":
//!
//! 1. **Token verification** — proving who a client is
//!    ([`TokenVerifier`] trait; the actual issuer lives in the external
//!    login service)
//! 2. **Session truth** — the authoritative, shared record that a player
//!    is live ([`SessionStore`] trait, [`MemoryStore`] implementation)
//! 3. **Connection registry** — the in-process bidirectional
//!    player ↔ connection index the router and push API resolve through
//!    ([`PlayerRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway / Dispatcher (above)  ← bind on auth, resolve on delivery
//!     ↕
//! Session layer (this crate)    ← identity, registry, shared store
//!     ↕
//! Protocol layer (below)        ← provides PlayerId
//! ```

mod auth;
mod error;
mod registry;
mod session;
mod store;

pub use auth::{TokenClaims, TokenVerifier};
pub use error::SessionError;
pub use registry::PlayerRegistry;
pub use session::SessionRecord;
pub use store::{MemoryStore, SessionStore};
