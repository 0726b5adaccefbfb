//! Token verification hook for establishing player identity.
//!
//! Netward doesn't mint or validate credentials itself — the external
//! login service does. The gateway only needs one thing at handshake
//! time: "whose token is this, and until when is it good?" That is the
//! [`TokenVerifier`] trait. Implement it against your identity provider
//! (JWT validation, an auth API call, an HMAC check) and hand it to the
//! gateway builder; the framework calls it during authentication and
//! enforces the expiry itself.

use async_trait::async_trait;

use crate::SessionError;

/// What a verified token proves: which account, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// The account the token was issued to.
    pub account_id: String,
    /// Expiry as milliseconds since the Unix epoch. The gateway rejects
    /// tokens whose expiry has passed, even if the verifier accepted the
    /// signature.
    pub expires_at_ms: u64,
}

/// Validates a client's auth token and returns its claims.
///
/// Object-safe so the gateway can hold any verifier behind
/// `Arc<dyn TokenVerifier>`.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use netward_session::{SessionError, TokenClaims, TokenVerifier};
///
/// /// Accepts tokens of the form "acct:<id>". Development only.
/// struct DevVerifier;
///
/// #[async_trait]
/// impl TokenVerifier for DevVerifier {
///     async fn verify(
///         &self,
///         token: &str,
///     ) -> Result<TokenClaims, SessionError> {
///         let account_id = token.strip_prefix("acct:").ok_or_else(|| {
///             SessionError::AuthFailed("unrecognized token".into())
///         })?;
///         Ok(TokenClaims {
///             account_id: account_id.to_string(),
///             expires_at_ms: u64::MAX,
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validates the given token.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] when the token is malformed, forged,
    /// or rejected by the identity provider.
    async fn verify(&self, token: &str) -> Result<TokenClaims, SessionError>;
}
