/// Errors that can occur while talking to the party service.
///
/// None of these say anything about the caller's session: a transport
/// failure must never be treated as "session invalidated".
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, timeout).
    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),

    /// A response arrived but its body did not parse.
    #[cfg(feature = "http")]
    #[error("malformed response body: {0}")]
    Decode(#[source] reqwest::Error),

    /// The service answered with a status this client does not expect.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The base URL could not be turned into an endpoint URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The push channel failed.
    #[error("event stream error: {0}")]
    Stream(String),

    /// A push message did not decode.
    #[error(transparent)]
    Protocol(#[from] partygate_protocol::ProtocolError),
}

impl TransportError {
    /// `true` for failures where no response was received at all.
    pub fn is_network(&self) -> bool {
        match self {
            #[cfg(feature = "http")]
            Self::Network(_) => true,
            Self::Stream(_) => true,
            _ => false,
        }
    }
}
