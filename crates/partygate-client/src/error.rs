//! Error types for the client layer.

use partygate_protocol::{PartyStatus, ProtocolError, Role};
use partygate_transport::TransportError;

use crate::Destination;

/// Failures of the durable session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store encoding: {0}")]
    Codec(#[from] ProtocolError),
}

/// Failures of [`AccessGate`](crate::AccessGate) submissions.
///
/// A capacity rejection is not here: it is the normal
/// [`Admission::Rejected`](crate::Admission::Rejected) outcome.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// A submission is already outstanding; no request was sent.
    #[error("a passkey submission is already in flight")]
    SubmissionInFlight,

    /// The service said the passkey is wrong. The stored token was not
    /// touched.
    #[error("invalid passkey")]
    InvalidPasskey,

    /// A logout or invalidation happened while the request was in flight,
    /// so its response was discarded.
    #[error("response discarded: the session changed while it was in flight")]
    Superseded,

    /// No response (offline, timeout). The stored token was not touched.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a privileged navigation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No stored token, so there is nothing to verify.
    NoSession,
    /// The live check returned a role other than Host.
    NotHost(Role),
    /// Host, but the destination also needs a full party.
    NotFull(PartyStatus),
    /// The live check was rejected (wrong passkey or no free slot).
    Rejected,
    /// The server no longer knows the stored session. The token was
    /// cleared and the gate relocked.
    SessionEnded,
    /// A logout happened while the check was in flight.
    Superseded,
    /// The live check could not reach the service.
    Unreachable,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSession => write!(f, "no session"),
            Self::NotHost(role) => write!(f, "role is {role}, not host"),
            Self::NotFull(status) => write!(
                f,
                "party not full ({}/{})",
                status.occupancy.total_users, status.occupancy.max_users
            ),
            Self::Rejected => write!(f, "verification rejected"),
            Self::SessionEnded => write!(f, "session ended"),
            Self::Superseded => write!(f, "session changed during verification"),
            Self::Unreachable => write!(f, "service unreachable"),
        }
    }
}

/// Errors from the poller and router.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A poller is already active for this gate.
    #[error("status poller is already active")]
    AlreadyActive,

    /// A privileged navigation was refused.
    #[error("access to {destination} denied: {reason}")]
    Denied {
        destination: Destination,
        reason: DenyReason,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClientError {
    /// The deny reason, if this is a denial.
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Denied { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
