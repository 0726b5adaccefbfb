//! `Gateway` builder and accept loop.
//!
//! This is the entry point for running a Netward server. It ties the
//! layers together: transport → protocol → session → rooms → dispatch.

use std::sync::Arc;

use netward_limit::RatePolicy;
use netward_session::{SessionStore, TokenVerifier};
use netward_transport::{Transport, WebSocketTransport};

use crate::connection::handle_connection;
use crate::{
    Dispatcher, EventHandler, GatewayConfig, GatewayError, ServerContext,
};

/// Builder for configuring and starting a gateway.
///
/// Starts with the built-in handlers registered; game-logic
/// collaborators add or replace handlers and tune per-event rate
/// policies before `build`.
///
/// # Example
///
/// ```rust,ignore
/// let gateway = GatewayBuilder::new()
///     .bind("0.0.0.0:8080")
///     .action_rate("chat:message", RatePolicy::per(Duration::from_secs(60), 30))
///     .build(verifier, store)
///     .await?;
/// gateway.run().await
/// ```
pub struct GatewayBuilder {
    bind_addr: String,
    config: GatewayConfig,
    dispatcher: Dispatcher,
}

impl GatewayBuilder {
    /// Creates a builder with default settings and the built-in
    /// handlers.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: GatewayConfig::default(),
            dispatcher: Dispatcher::with_default_handlers(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Replaces the gateway configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the rate policy of a registered event.
    pub fn action_rate(mut self, event: &str, policy: RatePolicy) -> Self {
        if !self.dispatcher.set_rate_policy(event, Some(policy)) {
            tracing::warn!(
                event,
                "rate override ignored: no handler registered"
            );
        }
        self
    }

    /// Registers (or replaces) an event handler — the hook for
    /// game-logic collaborators.
    pub fn handler(
        mut self,
        event: &str,
        required: &'static [&'static str],
        rate: Option<RatePolicy>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.dispatcher.register(event, required, rate, handler);
        self
    }

    /// Binds the transport and assembles the gateway around the given
    /// collaborators.
    pub async fn build(
        self,
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Gateway, GatewayError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        Ok(Gateway {
            transport,
            ctx: Arc::new(ServerContext::new(verifier, store, self.config)),
            dispatcher: Arc::new(self.dispatcher),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Netward gateway.
///
/// Call [`run()`](Self::run) to start accepting connections. Hold on to
/// [`context()`](Self::context) first — it is the push API the rest of
/// the server uses to reach players.
pub struct Gateway {
    transport: WebSocketTransport,
    ctx: Arc<ServerContext>,
    dispatcher: Arc<Dispatcher>,
}

impl Gateway {
    /// Creates a new builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The process-scoped context: push API and shared state.
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// Runs the accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), GatewayError> {
        tracing::info!("Netward gateway running");

        // Background sweep for limiter windows whose keys never get an
        // explicit release (per-IP admission windows).
        let sweep_ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            let period = std::time::Duration::from_secs(300);
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                sweep_ctx.conn_limiter.purge_idle(period).await;
                sweep_ctx.action_limiter.purge_idle(period).await;
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let ctx = Arc::clone(&self.ctx);
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, ctx, dispatcher).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
