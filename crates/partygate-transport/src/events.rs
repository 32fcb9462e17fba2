//! Client for the `/party/events` push channel using `tokio-tungstenite`.
//!
//! Events are hints only. A consumer reacts to one by polling
//! `/party/status`; it never changes local session state from an event.

use futures_util::StreamExt;
use partygate_protocol::{paths, Codec, JsonCodec, PartyEvent};
use tokio_tungstenite::tungstenite::Message;

use crate::TransportError;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Maps an http(s) base URL to the ws(s) URL of the event endpoint.
///
/// ```rust
/// use partygate_transport::events_url;
///
/// assert_eq!(
///     events_url("http://127.0.0.1:3000/").unwrap(),
///     "ws://127.0.0.1:3000/party/events",
/// );
/// ```
pub fn events_url(base_url: &str) -> Result<String, TransportError> {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(TransportError::InvalidUrl(base.to_string()));
    };
    Ok(format!("{ws}{}", paths::EVENTS))
}

/// An open subscription to party events.
pub struct EventStream {
    ws: WsStream,
    codec: JsonCodec,
}

impl EventStream {
    /// Opens the WebSocket at `url` (a `ws://` URL, see [`events_url`]).
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Stream(e.to_string()))?;
        tracing::debug!(url, "event stream connected");
        Ok(Self {
            ws,
            codec: JsonCodec,
        })
    }

    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` when the server closes the stream. Control
    /// frames are skipped.
    pub async fn next_event(&mut self) -> Result<Option<PartyEvent>, TransportError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(self.codec.decode(text.as_bytes())?));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(self.codec.decode(&data)?));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Stream(e.to_string())),
            }
        }
    }

    /// Sends a close frame. Errors are ignored; the peer may be gone.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
