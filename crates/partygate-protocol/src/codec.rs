//! Codec trait and implementations for serializing/deserializing bodies.
//!
//! HTTP handlers and the reqwest client do their own JSON work; the codec
//! exists for the places where Partygate moves bytes itself: the push event
//! stream and the file-backed session store.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` so one codec can live inside long-running tasks
/// and be shared between them.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON matches what the browser client historically stored and what the
/// HTTP endpoints speak, so everything Partygate writes stays inspectable.
///
/// ## Example
///
/// ```rust
/// use partygate_protocol::{Codec, JsonCodec, PartyEvent};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&PartyEvent::Reset).unwrap();
/// let decoded: PartyEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, PartyEvent::Reset);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Occupancy, PartyStatus};

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<PartyStatus, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_field_returns_decode_error() {
        // `sessionValid` is required on a status body.
        let body = br#"{"totalUsers":1,"maxUsers":5,"tankLevel":20,"isFull":false}"#;
        let result: Result<PartyStatus, _> = JsonCodec.decode(body);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_status_produces_camel_case_fields() {
        let status = PartyStatus {
            occupancy: Occupancy::new(2, 5),
            session_valid: true,
            role: None,
        };
        let bytes = JsonCodec.encode(&status).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"sessionValid\":true"));
        assert!(text.contains("\"totalUsers\":2"));
        assert!(!text.contains("role"), "absent role must be omitted: {text}");
    }
}
