//! Party session management for Partygate.
//!
//! This crate is the server-side bookkeeping of who is at the party:
//!
//! 1. **Passkey check**: the [`PasskeyVerifier`] trait, with
//!    [`SharedPasskey`] as the exact-match implementation
//! 2. **Slot registry**: [`SessionManager`] issues tokens, assigns the
//!    single Host role, counts Guests against capacity
//! 3. **Invalidation**: a Host logout wipes every session party-wide
//!
//! # How it fits in the stack
//!
//! ```text
//! Party actor (above)  ← serializes every call into the manager
//!     ↕
//! Session layer (this crate)  ← tokens, roles, capacity
//!     ↕
//! Protocol layer (below)  ← Role, SessionToken, Occupancy
//! ```
//!
//! `SessionManager` is deliberately not thread-safe. The party actor owns
//! it, and the "at most one Host" invariant rests on that single owner.

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod manager;
mod session;

pub use auth::{PasskeyVerifier, SharedPasskey};
pub use error::SessionError;
pub use manager::{AuthOutcome, LogoutOutcome, SessionManager};
pub use session::{LogoutScope, Session, SessionConfig};
