//! Core protocol types for Partygate's wire format.
//!
//! Every type here is a JSON body that travels between the party service
//! and its clients. Field names are camelCase on the wire because the
//! first client was a browser.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// An opaque session token issued by the party service.
///
/// The token correlates status and logout calls with one registered slot.
/// It carries no client-side expiry: only the server knows whether it is
/// still valid.
///
/// `Display` prints a short prefix so tokens can appear in logs without
/// leaking the whole credential.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw token, as sent in the `x-session-token` header.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token and returns the raw string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "tok-{prefix}")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({self})")
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A participant's role in the party.
///
/// ```text
/// Unauthenticated ──(authenticate)──→ Host   (first slot, at most one)
///                 └─(authenticate)──→ Guest  (every other slot)
/// ```
///
/// On the wire only `"host"` and `"guest"` appear, always wrapped in an
/// `Option`: an absent role *is* `Unauthenticated`. Use
/// [`Role::from_wire`] to collapse the two.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Unauthenticated,
    Guest,
    Host,
}

impl Role {
    /// Converts an optional wire role into a client role.
    pub fn from_wire(role: Option<Role>) -> Self {
        role.unwrap_or(Role::Unauthenticated)
    }

    /// `true` for Host and Guest.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Role::Unauthenticated)
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unauthenticated => write!(f, "unauthenticated"),
            Role::Guest => write!(f, "guest"),
            Role::Host => write!(f, "host"),
        }
    }
}

// ---------------------------------------------------------------------------
// Occupancy
// ---------------------------------------------------------------------------

/// The capacity half of every party response.
///
/// Invariant: `total_users <= max_users`. `tank_level` and `is_full` are
/// derived from the two counts by [`Occupancy::new`]; servers should never
/// build this struct field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub total_users: usize,
    pub max_users: usize,
    /// Fill percentage, `floor(total * 100 / max)`.
    pub tank_level: u8,
    pub is_full: bool,
}

impl Occupancy {
    /// Derives the full occupancy from the two counters.
    ///
    /// `max_users == 0` is treated as an always-full party.
    pub fn new(total_users: usize, max_users: usize) -> Self {
        let tank_level = if max_users == 0 {
            100
        } else {
            (total_users.min(max_users) * 100 / max_users) as u8
        };
        Self {
            total_users,
            max_users,
            tank_level,
            is_full: total_users >= max_users,
        }
    }

    /// Slots still available.
    pub fn remaining(&self) -> usize {
        self.max_users.saturating_sub(self.total_users)
    }

    /// Checks the `total_users <= max_users` invariant on a received body.
    pub fn is_consistent(&self) -> bool {
        self.total_users <= self.max_users
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /party/authenticate`.
///
/// With `refresh` set, the call only confirms the session named by the
/// presented token and never registers a slot. An absent or unknown token
/// is then answered with `sessionValid: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub passkey: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub refresh: bool,
}

impl AuthenticateRequest {
    /// A registering request: a live token is refreshed, anything else
    /// takes a new slot.
    pub fn new(passkey: impl Into<String>) -> Self {
        Self {
            passkey: passkey.into(),
            refresh: false,
        }
    }

    /// A refresh-only request.
    pub fn refresh(passkey: impl Into<String>) -> Self {
        Self {
            passkey: passkey.into(),
            refresh: true,
        }
    }
}

/// Response of `POST /party/authenticate`.
///
/// Success (`200`) carries a role and a token. Invalid-passkey (`401`) and
/// party-full (`403`) responses carry only the occupancy: the absence of
/// `role` is what distinguishes them. A refresh for a session that no
/// longer exists also says `sessionValid: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<SessionToken>,

    #[serde(flatten)]
    pub occupancy: Occupancy,

    /// Only present on a refresh-only rejection, as `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_valid: Option<bool>,

    /// Human-readable reason on rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthenticateResponse {
    /// A successful registration or refresh.
    pub fn admitted(
        role: Role,
        token: SessionToken,
        occupancy: Occupancy,
    ) -> Self {
        Self {
            role: Some(role),
            token: Some(token),
            occupancy,
            session_valid: None,
            error: None,
        }
    }

    /// A rejection (wrong passkey or no free slot).
    pub fn rejected(occupancy: Occupancy, reason: impl Into<String>) -> Self {
        Self {
            role: None,
            token: None,
            occupancy,
            session_valid: None,
            error: Some(reason.into()),
        }
    }

    /// The answer to a refresh whose token names no live session.
    pub fn session_invalid(occupancy: Occupancy, reason: impl Into<String>) -> Self {
        Self {
            session_valid: Some(false),
            ..Self::rejected(occupancy, reason)
        }
    }

    /// `true` when a refresh found the presented session gone.
    pub fn is_session_invalid(&self) -> bool {
        self.role.is_none() && self.session_valid == Some(false)
    }

    /// `true` when the response admitted the caller.
    pub fn is_admitted(&self) -> bool {
        self.role.is_some()
    }
}

/// Response of `GET /party/status`: the latest [`Occupancy`] plus whether
/// the presented token (if any) still names a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyStatus {
    #[serde(flatten)]
    pub occupancy: Occupancy,

    pub session_valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl PartyStatus {
    /// Builds the status snapshot a client derives from an authenticate
    /// response (the service does not send `sessionValid` there).
    pub fn from_authenticate(resp: &AuthenticateResponse) -> Self {
        Self {
            occupancy: resp.occupancy,
            session_valid: resp.is_admitted(),
            role: resp.role,
        }
    }
}

/// Response of `POST /party/logout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    /// `true` when the logout invalidated at least one session.
    pub reset: bool,

    #[serde(flatten)]
    pub occupancy: Occupancy,
}

// ---------------------------------------------------------------------------
// Push events
// ---------------------------------------------------------------------------

/// Messages pushed on the `/party/events` WebSocket.
///
/// They are hints, not state: a client reacting to an event still polls
/// `/party/status` to learn whether *its* session survived.
///
/// ```json
/// {"type":"Occupancy","totalUsers":3,"maxUsers":5,"tankLevel":60,"isFull":false}
/// {"type":"Reset"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PartyEvent {
    /// Someone joined or left.
    Occupancy(Occupancy),
    /// The Host logged out; every session was invalidated.
    Reset,
}

// ---------------------------------------------------------------------------
// Request tracker
// ---------------------------------------------------------------------------

/// Response of `POST /track-request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub current_count: u64,
    pub remaining_requests: u64,
}

/// Response of `GET /admin/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    #[serde(flatten)]
    pub tracker: TrackerStats,

    pub party: Occupancy,
}

// =========================================================================
// Tests
// =========================================================================
