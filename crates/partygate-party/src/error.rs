//! Error types for the party layer.

use partygate_protocol::{Occupancy, TrackerStats};
use partygate_session::SessionError;

/// Errors returned by [`PartyHandle`](crate::PartyHandle) calls.
///
/// Rejections carry the occupancy snapshot taken at the moment of the
/// decision, because the HTTP surface reports it even on `401`/`403`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartyError {
    /// Wrong passkey or no free slot.
    #[error("authentication rejected: {reason}")]
    Rejected {
        reason: SessionError,
        occupancy: Occupancy,
    },

    /// `/track-request` has been hit `limit` times already.
    #[error("request limit of {limit} reached")]
    RequestLimitReached { limit: u64, stats: TrackerStats },

    /// The actor's command channel is closed (the party shut down).
    #[error("party is unavailable")]
    Unavailable,
}

impl PartyError {
    /// The occupancy snapshot attached to a rejection.
    pub fn occupancy(&self) -> Option<Occupancy> {
        match self {
            Self::Rejected { occupancy, .. } => Some(*occupancy),
            _ => None,
        }
    }
}
