//! Client-side transport for Partygate.
//!
//! Provides the [`PartyApi`] trait the client state machines are written
//! against, so they can be driven by the real HTTP service or by an
//! in-process fake in tests.
//!
//! # Feature Flags
//!
//! - `http` (default): [`HttpPartyApi`] via `reqwest`
//! - `events` (default): [`EventStream`] for `/party/events` via
//!   `tokio-tungstenite`

mod error;
#[cfg(feature = "events")]
mod events;
#[cfg(feature = "http")]
mod http;

pub use error::TransportError;
#[cfg(feature = "events")]
pub use events::{events_url, EventStream};
#[cfg(feature = "http")]
pub use http::HttpPartyApi;

use partygate_protocol::{
    AuthenticateResponse, LogoutResponse, PartyStatus, SessionToken,
};

/// How the service answered an authentication request.
///
/// Every variant carries a body with the occupancy fields, because the gate
/// refreshes the displayed party status even on a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    /// `200`: a role and a token were issued (or refreshed).
    Admitted(AuthenticateResponse),
    /// `401`: wrong passkey.
    InvalidPasskey(AuthenticateResponse),
    /// `403`: every slot is taken.
    PartyFull(AuthenticateResponse),
    /// A refresh found the presented session gone (`sessionValid: false`).
    SessionInvalid(AuthenticateResponse),
}

impl AuthReply {
    pub fn body(&self) -> &AuthenticateResponse {
        match self {
            Self::Admitted(b)
            | Self::InvalidPasskey(b)
            | Self::PartyFull(b)
            | Self::SessionInvalid(b) => b,
        }
    }

    pub fn into_body(self) -> AuthenticateResponse {
        match self {
            Self::Admitted(b)
            | Self::InvalidPasskey(b)
            | Self::PartyFull(b)
            | Self::SessionInvalid(b) => b,
        }
    }

    /// Classifies a decoded body. The presence of `role` decides; the
    /// status code only separates the rejections.
    pub fn classify(status: u16, body: AuthenticateResponse) -> Self {
        if body.role.is_some() {
            Self::Admitted(body)
        } else if body.is_session_invalid() {
            Self::SessionInvalid(body)
        } else if status == 403 || (status != 401 && body.occupancy.is_full) {
            Self::PartyFull(body)
        } else {
            Self::InvalidPasskey(body)
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// The three party endpoints, as seen by a client.
///
/// `Send + Sync + 'static` because the poller calls it from a spawned task.
/// The returned futures are `Send` for the same reason.
pub trait PartyApi: Send + Sync + 'static {
    /// `POST /party/authenticate`. Registers a slot unless `token` names a
    /// live session.
    fn authenticate(
        &self,
        passkey: &str,
        token: Option<&SessionToken>,
    ) -> impl std::future::Future<Output = Result<AuthReply, TransportError>> + Send;

    /// `POST /party/authenticate` with `refresh: true`. Never registers;
    /// a dead `token` yields [`AuthReply::SessionInvalid`].
    fn refresh(
        &self,
        passkey: &str,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<AuthReply, TransportError>> + Send;

    /// `GET /party/status`.
    fn status(
        &self,
        token: Option<&SessionToken>,
    ) -> impl std::future::Future<Output = Result<PartyStatus, TransportError>> + Send;

    /// `POST /party/logout`.
    fn logout(
        &self,
        token: &SessionToken,
    ) -> impl std::future::Future<Output = Result<LogoutResponse, TransportError>> + Send;
}
