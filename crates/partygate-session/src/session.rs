//! Session types: the server's record of one registered participant.

use std::time::Instant;

use partygate_protocol::{Role, SessionToken};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// What a Guest's logout does.
///
/// A Host logout always resets the whole party. Guests never reach the
/// logout surface in the site itself, but the endpoint accepts any token,
/// so the server has to pick a meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutScope {
    /// Release only the caller's slot.
    #[default]
    OwnSlot,
    /// Treat any logout like the Host's: invalidate everyone.
    PartyWide,
}

/// Configuration for the slot registry.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Party capacity, Host included. Default: 5.
    pub max_users: usize,

    /// Effect of a logout presented with a Guest token.
    pub guest_logout: LogoutScope,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_users: partygate_protocol::DEFAULT_MAX_USERS,
            guest_logout: LogoutScope::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single registered participant.
///
/// Created on the first successful authentication; lives until the
/// participant logs out or the Host resets the party.
#[derive(Debug, Clone)]
pub struct Session {
    /// The credential the client presents in `x-session-token`.
    /// 32 lowercase hex chars (128 random bits).
    pub token: SessionToken,

    /// Host or Guest. Never `Unauthenticated` for a stored session.
    pub role: Role,

    /// Monotonic registration number, used only for logs.
    pub slot: u64,

    pub registered_at: Instant,
}
