//! Gateway configuration.

use std::time::Duration;

use netward_limit::RatePolicy;

/// Tunable limits and timeouts for the gateway.
///
/// The per-event action rate policies live on the handler table, not
/// here — see [`GatewayBuilder::action_rate`](crate::GatewayBuilder).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a fresh connection has to authenticate before it is
    /// closed.
    pub auth_timeout: Duration,

    /// How long an authenticated connection may stay silent before it
    /// is closed. `ping` resets the clock like any other event.
    pub idle_timeout: Duration,

    /// TTL written to the session store on authentication. A record
    /// left behind by an unclean shutdown disappears after this long.
    pub session_ttl: Duration,

    /// Admission window applied per remote IP at connect time. Failing
    /// it closes the connection before any event is accepted.
    pub accept_rate: RatePolicy,

    /// Raw-traffic window applied per connection to every inbound
    /// frame. Exceeding it drops the event (with a typed error) but
    /// keeps the connection alive.
    pub connection_rate: RatePolicy,

    /// Hard cap on concurrently registered connections. Connects beyond
    /// it are rejected at admission.
    pub max_connections: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            session_ttl: Duration::from_secs(300),
            accept_rate: RatePolicy::per(Duration::from_secs(60), 20),
            connection_rate: RatePolicy::per(Duration::from_secs(1), 50),
            max_connections: 1024,
        }
    }
}
