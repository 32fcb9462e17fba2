//! Error types for the protocol layer.
//!
//! Each Partygate crate defines its own error enum. A `ProtocolError` always
//! means a body could not be (de)serialized or violated a protocol rule,
//! never that the network or the party itself misbehaved.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing required fields,
    /// wrong data types, or a truncated body.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The body parsed but breaks a protocol rule, for example an
    /// occupancy with `totalUsers > maxUsers`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
