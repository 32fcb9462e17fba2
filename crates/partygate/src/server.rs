//! `PartygateServer` builder and serve loop.
//!
//! Ties the layers together: the party actor owns the state, axum routes
//! HTTP requests to the handlers, and the handlers talk to the actor.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use partygate_party::{spawn_party, spawn_party_with_verifier, PartyConfig, PartyHandle};
use partygate_protocol::paths;
use partygate_session::PasskeyVerifier;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::PartygateError;

/// Builder for configuring and starting a Partygate server.
///
/// # Example
///
/// ```rust,no_run
/// use partygate::prelude::*;
///
/// # async fn run() -> Result<(), PartygateError> {
/// let server = PartygateServer::builder()
///     .bind("0.0.0.0:3000")
///     .party_config(PartyConfig::default().with_max_users(8))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PartygateServerBuilder {
    bind_addr: String,
    party_config: PartyConfig,
}

impl PartygateServerBuilder {
    /// Creates a builder with default settings (`127.0.0.1:3000`, five
    /// slots, passkey `welcome`).
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            party_config: PartyConfig::default(),
        }
    }

    /// Sets the address to bind to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn party_config(mut self, config: PartyConfig) -> Self {
        self.party_config = config;
        self
    }

    /// Binds the listener and spawns the party actor with the shared
    /// passkey from the party config.
    pub async fn build(self) -> Result<PartygateServer, PartygateError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let party = spawn_party(self.party_config);
        Ok(PartygateServer::new(listener, party))
    }

    /// Like [`build`](Self::build) with a custom passkey check.
    pub async fn build_with_verifier<V: PasskeyVerifier>(
        self,
        verifier: V,
    ) -> Result<PartygateServer, PartygateError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let party = spawn_party_with_verifier(self.party_config, verifier);
        Ok(PartygateServer::new(listener, party))
    }
}

impl Default for PartygateServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Partygate server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct PartygateServer {
    listener: TcpListener,
    party: PartyHandle,
}

impl PartygateServer {
    pub fn builder() -> PartygateServerBuilder {
        PartygateServerBuilder::new()
    }

    fn new(listener: TcpListener, party: PartyHandle) -> Self {
        Self { listener, party }
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle to the party actor, for in-process inspection.
    pub fn party(&self) -> &PartyHandle {
        &self.party
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), PartygateError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "partygate server running");

        axum::serve(self.listener, router(self.party)).await?;
        Ok(())
    }
}

/// The full route table.
pub fn router(party: PartyHandle) -> Router {
    Router::new()
        .route(paths::AUTHENTICATE, post(handler::authenticate))
        .route(paths::STATUS, get(handler::status))
        .route(paths::LOGOUT, post(handler::logout))
        .route(paths::EVENTS, get(handler::events))
        .route(paths::TRACK_REQUEST, post(handler::track_request))
        .route(paths::ADMIN_STATS, get(handler::admin_stats))
        .route(paths::HEALTH, get(handler::health))
        .layer(TraceLayer::new_for_http())
        .with_state(party)
}
