//! Unified error type for Partygate.

use partygate_party::PartyError;
use partygate_protocol::ProtocolError;
use partygate_session::SessionError;
use partygate_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors, so code using
/// the `partygate` crate deals with this one type.
#[derive(Debug, thiserror::Error)]
pub enum PartygateError {
    /// Binding or serving the listener failed.
    #[error("server io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Party(#[from] PartyError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
