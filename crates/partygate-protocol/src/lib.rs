//! Wire protocol for Partygate.
//!
//! This crate defines the "language" that the party clients and the party
//! service speak over HTTP:
//!
//! - **Types** ([`Role`], [`Occupancy`], [`PartyStatus`],
//!   [`AuthenticateResponse`], etc.): the JSON bodies of the three party
//!   endpoints plus the push events and tracker stats.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those bodies are
//!   converted to/from bytes outside of the HTTP stack (the file-backed
//!   session store reuses it).
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets, sessions or timers.
//!
//! ```text
//! Transport (HTTP / WebSocket) → Protocol (bodies) → Session / Client state
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AdminStats, AuthenticateRequest, AuthenticateResponse, LogoutResponse,
    Occupancy, PartyEvent, PartyStatus, Role, SessionToken, TrackerStats,
};

/// Header carrying the session token on status, logout and re-authentication.
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Header carrying the passkey on the admin stats endpoint.
pub const PASSKEY_HEADER: &str = "x-passkey";

/// The well-known party passkey. The silent refresh sends this value
/// together with the stored token to "prove/refresh current standing".
pub const DEFAULT_PASSKEY: &str = "welcome";

/// Default party capacity (one Host plus four Guests).
pub const DEFAULT_MAX_USERS: usize = 5;

/// Endpoint paths, shared by the server router and the HTTP client.
pub mod paths {
    pub const AUTHENTICATE: &str = "/party/authenticate";
    pub const STATUS: &str = "/party/status";
    pub const LOGOUT: &str = "/party/logout";
    pub const EVENTS: &str = "/party/events";
    pub const TRACK_REQUEST: &str = "/track-request";
    pub const ADMIN_STATS: &str = "/admin/stats";
    pub const HEALTH: &str = "/health";
}
