//! Error types for the session layer.

/// Errors that can occur while admitting or looking up participants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The submitted passkey did not match. No state was changed.
    #[error("invalid passkey")]
    InvalidPasskey,

    /// Every slot is taken. Not a failure of the caller: it is the normal
    /// outcome for a late joiner, reported with `isFull=true` and no role.
    #[error("party is full ({max_users} of {max_users} slots taken)")]
    PartyFull { max_users: usize },

    /// The token does not name a live session (never issued, released,
    /// or wiped by a party reset).
    #[error("unknown session token")]
    UnknownToken,
}
