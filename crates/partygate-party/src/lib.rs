//! The party actor for Partygate.
//!
//! One Tokio task owns every piece of server-side party state: the
//! [`SessionManager`](partygate_session::SessionManager) and the request
//! tracker. HTTP handlers talk to it through a [`PartyHandle`]; each call
//! is a message with a oneshot reply, so authentications, status polls and
//! logouts are applied strictly one after another.
//!
//! # Key types
//!
//! - [`PartyHandle`]: cheap-to-clone sender side of the actor
//! - [`PartyConfig`]: capacity, passkeys, logout scope, tracker limit
//! - [`PartyPhase`]: `Open` or `Full`, derived from occupancy
//! - [`RequestTracker`]: bounded hit counter behind `/track-request`

mod config;
mod error;
mod party;
mod tracker;

pub use config::{PartyConfig, PartyPhase};
pub use error::PartyError;
pub use party::{spawn_party, spawn_party_with_verifier, PartyHandle};
pub use tracker::RequestTracker;
