//! Role-gated navigation.
//!
//! A destination is entered only after a live refresh of the stored session
//! at the moment of the attempt. The role cached in the [`SessionContext`]
//! is never trusted for this: it can be up to one poll interval stale. The
//! check never takes a party slot.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use partygate_protocol::{PartyStatus, Role, DEFAULT_PASSKEY};
use partygate_transport::{AuthReply, PartyApi};

use crate::{ClientError, DenyReason, SessionContext, StatusApplied};

/// A privileged area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The Host's home. Needs a live Host role.
    Home,
    /// The after-party. Needs a live Host role and a full party.
    Secret,
}

impl Destination {
    /// Whether entry also needs the live `isFull` flag.
    pub fn requires_full_party(&self) -> bool {
        matches!(self, Self::Secret)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Secret => write!(f, "secret"),
        }
    }
}

/// Proof of a passed live check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub destination: Destination,
    pub role: Role,
    pub status: PartyStatus,
}

pub struct RoleGatedRouter<A: PartyApi> {
    api: Arc<A>,
    context: Arc<SessionContext>,
    verify_passkey: String,
    location: Mutex<Option<Destination>>,
}

impl<A: PartyApi> RoleGatedRouter<A> {
    pub fn new(api: Arc<A>, context: Arc<SessionContext>) -> Self {
        Self {
            api,
            context,
            verify_passkey: DEFAULT_PASSKEY.to_string(),
            location: Mutex::new(None),
        }
    }

    /// Passkey presented with the stored token on each live check.
    pub fn with_verify_passkey(mut self, passkey: impl Into<String>) -> Self {
        self.verify_passkey = passkey.into();
        self
    }

    /// The last destination entered, `None` while at the gate.
    pub fn location(&self) -> Option<Destination> {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Navigates to `destination` if a live check allows it.
    ///
    /// On denial the location falls back to the gate.
    pub async fn enter(&self, destination: Destination) -> Result<Verified, ClientError> {
        let result = self.guard(destination).await;
        let mut location = self.location.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Ok(_) => *location = Some(destination),
            Err(_) => *location = None,
        }
        result
    }

    /// Re-verifies access to `destination` without navigating.
    ///
    /// The fresh response is applied to the shared context either way, so a
    /// denied Host still sees the current occupancy.
    ///
    /// # Errors
    /// [`ClientError::Denied`] with the reason, or [`ClientError::Store`]
    /// if the token could not be read or written.
    pub async fn guard(&self, destination: Destination) -> Result<Verified, ClientError> {
        let deny = |reason: DenyReason| {
            tracing::info!(%destination, %reason, "navigation denied");
            ClientError::Denied {
                destination,
                reason,
            }
        };

        let Some(token) = self.context.token()? else {
            return Err(deny(DenyReason::NoSession));
        };

        let intent = self.context.begin_request();
        let reply = match self.api.refresh(&self.verify_passkey, &token).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "live role check failed");
                return Err(deny(DenyReason::Unreachable));
            }
        };

        let body = match reply {
            AuthReply::Admitted(body) => body,
            AuthReply::SessionInvalid(body) => {
                if self.context.apply_session_invalid(&intent, &body, &token)?
                    == StatusApplied::Invalidated
                {
                    tracing::info!(%token, "stored session ended, gate shown");
                }
                return Err(deny(DenyReason::SessionEnded));
            }
            rejected => {
                self.context.apply_rejected(&intent, rejected.body());
                return Err(deny(DenyReason::Rejected));
            }
        };

        if !self.context.apply_authenticated(&intent, &body)? {
            return Err(deny(DenyReason::Superseded));
        }

        let role = Role::from_wire(body.role);
        let status = PartyStatus::from_authenticate(&body);
        if !role.is_host() {
            return Err(deny(DenyReason::NotHost(role)));
        }
        if destination.requires_full_party() && !status.occupancy.is_full {
            return Err(deny(DenyReason::NotFull(status)));
        }

        tracing::debug!(%destination, "navigation verified");
        Ok(Verified {
            destination,
            role,
            status,
        })
    }
}
