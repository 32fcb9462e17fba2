//! Party configuration and phase.

use partygate_protocol::{Occupancy, DEFAULT_MAX_USERS, DEFAULT_PASSKEY};
use partygate_session::{LogoutScope, SessionConfig};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PartyConfig
// ---------------------------------------------------------------------------

/// Configuration for the party actor.
#[derive(Debug, Clone)]
pub struct PartyConfig {
    /// Capacity, Host included.
    pub max_users: usize,

    /// The shared passkey checked on `/party/authenticate`.
    pub passkey: String,

    /// Passkey for `/admin/stats`. `None` reuses [`Self::passkey`].
    pub admin_passkey: Option<String>,

    /// What a Guest's logout does.
    pub guest_logout: LogoutScope,

    /// How many `/track-request` hits are allowed before `429`.
    pub request_limit: u64,

    /// Bound of the actor's command channel. Callers wait when it fills.
    pub channel_size: usize,

    /// Buffer of the push-event broadcast. Slow subscribers that fall
    /// further behind skip to the newest event.
    pub event_capacity: usize,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            max_users: DEFAULT_MAX_USERS,
            passkey: DEFAULT_PASSKEY.to_string(),
            admin_passkey: None,
            guest_logout: LogoutScope::default(),
            request_limit: 1_000,
            channel_size: 256,
            event_capacity: 64,
        }
    }
}

impl PartyConfig {
    pub fn with_max_users(mut self, max_users: usize) -> Self {
        self.max_users = max_users;
        self
    }

    pub fn with_passkey(mut self, passkey: impl Into<String>) -> Self {
        self.passkey = passkey.into();
        self
    }

    pub fn with_admin_passkey(mut self, passkey: impl Into<String>) -> Self {
        self.admin_passkey = Some(passkey.into());
        self
    }

    pub fn with_guest_logout(mut self, scope: LogoutScope) -> Self {
        self.guest_logout = scope;
        self
    }

    pub fn with_request_limit(mut self, limit: u64) -> Self {
        self.request_limit = limit;
        self
    }

    /// The slice handed to the session registry.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_users: self.max_users,
            guest_logout: self.guest_logout,
        }
    }

    /// The passkey guarding `/admin/stats`.
    pub fn effective_admin_passkey(&self) -> &str {
        self.admin_passkey.as_deref().unwrap_or(&self.passkey)
    }
}

// ---------------------------------------------------------------------------
// PartyPhase
// ---------------------------------------------------------------------------

/// Whether the party still admits new participants.
///
/// ```text
/// Open ──(last slot taken)──→ Full ──(guest leaves / host resets)──→ Open
/// ```
///
/// Unlike a room lifecycle there is no terminal phase: a reset empties the
/// party and it starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyPhase {
    Open,
    Full,
}

impl PartyPhase {
    pub fn from_occupancy(occupancy: &Occupancy) -> Self {
        if occupancy.is_full {
            Self::Full
        } else {
            Self::Open
        }
    }

    /// `true` if a caller without a live token can still get a slot.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for PartyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Full => write!(f, "Full"),
        }
    }
}
