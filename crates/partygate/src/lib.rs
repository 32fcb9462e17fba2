//! # Partygate
//!
//! Party access control and session synchronization.
//!
//! A party admits anyone who knows one shared passkey, up to a fixed
//! number of slots. The first to arrive becomes the Host, the rest are
//! Guests. When the Host logs out the whole party is reset, and every
//! Guest finds out on its next status poll.
//!
//! This crate bundles the HTTP service ([`PartygateServer`]) and re-exports
//! the client state machines from `partygate-client`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use partygate::prelude::*;
//!
//! # async fn run() -> Result<(), PartygateError> {
//! let server = PartygateServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::PartygateError;
pub use server::{router, PartygateServer, PartygateServerBuilder};

/// Everything needed to run a server or drive a client.
pub mod prelude {
    pub use crate::{PartygateError, PartygateServer, PartygateServerBuilder};

    pub use partygate_protocol::{
        AdminStats, AuthenticateResponse, Codec, JsonCodec, LogoutResponse,
        Occupancy, PartyEvent, PartyStatus, ProtocolError, Role, SessionToken,
        TrackerStats, DEFAULT_MAX_USERS, DEFAULT_PASSKEY,
    };

    pub use partygate_session::{
        LogoutScope, PasskeyVerifier, SessionError, SharedPasskey,
    };

    pub use partygate_party::{PartyConfig, PartyError, PartyHandle, PartyPhase};

    pub use partygate_tick::TickConfig;

    pub use partygate_transport::{AuthReply, HttpPartyApi, PartyApi, TransportError};

    pub use partygate_client::{
        AccessGate, Admission, ClientError, ClientView, DenyReason,
        Destination, FileSessionStore, GateError, GateState,
        MemorySessionStore, PartyStatusPoller, PollerConfig, PollerHandle,
        RoleGatedRouter, SessionContext, SessionStore, Verified,
    };
}
