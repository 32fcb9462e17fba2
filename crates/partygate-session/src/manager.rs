//! The session manager: the registry of every occupied party slot.
//!
//! Responsibilities:
//! - Issuing tokens on first admission
//! - Handing out the single Host role (first slot after a reset)
//! - Refusing admission once capacity is reached
//! - Answering "is this token still live?" for status polls
//! - Releasing one slot or wiping the party on logout

use std::collections::HashMap;
use std::time::Instant;

use partygate_protocol::{Occupancy, Role, SessionToken};
use rand::Rng;

use crate::{LogoutScope, Session, SessionConfig, SessionError};

/// Result of a successful [`SessionManager::admit`].
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// A new slot was taken and a new token issued.
    Registered(Session),
    /// The caller presented a live token; nothing changed.
    Refreshed(Session),
}

impl AuthOutcome {
    pub fn session(&self) -> &Session {
        match self {
            Self::Registered(s) | Self::Refreshed(s) => s,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Registered(_))
    }
}

/// Result of [`SessionManager::logout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The token named no live session. Nothing changed.
    UnknownToken,
    /// A Guest left; the Host and other Guests are untouched.
    SlotReleased,
    /// Every session was invalidated.
    PartyReset { invalidated: usize },
}

impl LogoutOutcome {
    /// `true` if any session was invalidated.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::UnknownToken)
    }
}

/// Tracks every registered participant.
///
/// ## Lifecycle
///
/// ```text
///               admit()                 logout(host) / reset()
/// [empty] ──→ [Host] ──→ [Host + Guests] ─────────────────────→ [empty]
///                              │  ▲
///               logout(guest)  │  │ admit()
///                              ▼  │
///                         [Host + fewer Guests]
/// ```
///
/// Invariants, checked by the tests below:
/// - `len() <= config.max_users`
/// - at most one session has `Role::Host`
/// - `host` is `Some` iff a session with `Role::Host` exists
pub struct SessionManager {
    /// Live sessions keyed by raw token.
    sessions: HashMap<String, Session>,

    /// Raw token of the current Host, if any.
    host: Option<String>,

    /// Registration counter for log correlation.
    next_slot: u64,

    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            host: None,
            next_slot: 1,
            config,
        }
    }

    /// Admits a caller whose passkey has already been verified.
    ///
    /// A live `presented` token is refreshed (same role, same token) and
    /// never counts against capacity. An absent or unknown token registers
    /// a new slot: Host if nobody holds that role, Guest otherwise.
    ///
    /// # Errors
    /// [`SessionError::PartyFull`] if a new slot is needed and none is free.
    pub fn admit(
        &mut self,
        presented: Option<&str>,
    ) -> Result<AuthOutcome, SessionError> {
        if let Some(existing) = presented.and_then(|t| self.sessions.get(t)) {
            tracing::debug!(
                token = %existing.token,
                role = %existing.role,
                "session refreshed"
            );
            return Ok(AuthOutcome::Refreshed(existing.clone()));
        }

        if self.sessions.len() >= self.config.max_users {
            tracing::info!(
                max_users = self.config.max_users,
                "admission refused, party is full"
            );
            return Err(SessionError::PartyFull {
                max_users: self.config.max_users,
            });
        }

        let role = if self.host.is_none() {
            Role::Host
        } else {
            Role::Guest
        };

        let raw = generate_token();
        let session = Session {
            token: SessionToken::new(raw.clone()),
            role,
            slot: self.next_slot,
            registered_at: Instant::now(),
        };
        self.next_slot += 1;

        if role == Role::Host {
            self.host = Some(raw.clone());
        }
        self.sessions.insert(raw, session.clone());

        tracing::info!(
            token = %session.token,
            %role,
            slot = session.slot,
            total = self.sessions.len(),
            "session registered"
        );

        Ok(AuthOutcome::Registered(session))
    }

    /// Confirms the session named by `presented` without ever registering.
    ///
    /// # Errors
    /// [`SessionError::UnknownToken`] if no token was presented or it names
    /// no live session.
    pub fn refresh(&self, presented: Option<&str>) -> Result<&Session, SessionError> {
        let Some(session) = presented.and_then(|t| self.sessions.get(t)) else {
            tracing::debug!(
                presented = presented.is_some(),
                "refresh refused, no live session"
            );
            return Err(SessionError::UnknownToken);
        };
        Ok(session)
    }

    /// Looks up a live session by raw token.
    pub fn resolve(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// Ends the session named by `token`.
    ///
    /// A Host token resets the party. A Guest token follows
    /// [`SessionConfig::guest_logout`].
    pub fn logout(&mut self, token: &str) -> LogoutOutcome {
        let Some(session) = self.sessions.get(token) else {
            return LogoutOutcome::UnknownToken;
        };

        let party_wide = session.role == Role::Host
            || self.config.guest_logout == LogoutScope::PartyWide;

        if party_wide {
            let invalidated = self.reset();
            LogoutOutcome::PartyReset { invalidated }
        } else {
            if let Some(removed) = self.sessions.remove(token) {
                tracing::info!(
                    token = %removed.token,
                    total = self.sessions.len(),
                    "guest slot released"
                );
            }
            LogoutOutcome::SlotReleased
        }
    }

    /// Invalidates every session. Returns how many were dropped.
    pub fn reset(&mut self) -> usize {
        let invalidated = self.sessions.len();
        self.sessions.clear();
        self.host = None;
        tracing::info!(invalidated, "party reset");
        invalidated
    }

    /// Current occupancy snapshot.
    pub fn occupancy(&self) -> Occupancy {
        Occupancy::new(self.sessions.len(), self.config.max_users)
    }

    /// The current Host session, if any.
    pub fn host(&self) -> Option<&Session> {
        self.host.as_deref().and_then(|t| self.sessions.get(t))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
