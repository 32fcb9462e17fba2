//! HTTP handlers: one per endpoint, each a thin adapter over [`PartyHandle`].
//!
//! The handlers only translate. Headers and JSON bodies in, a
//! `PartyHandle` call, then the result mapped to a status code:
//!
//! | outcome | status |
//! |---|---|
//! | success | `200` |
//! | missing `x-session-token` on logout | `400` |
//! | wrong passkey | `401` |
//! | refresh of a session that no longer exists | `401`, `sessionValid: false` |
//! | party full | `403` |
//! | request limit reached | `429` |
//! | party actor gone | `503` |

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use partygate_party::{PartyError, PartyHandle};
use partygate_protocol::{
    AuthenticateRequest, AuthenticateResponse, PartyEvent, SessionToken,
    PASSKEY_HEADER, SESSION_TOKEN_HEADER,
};
use partygate_session::SessionError;
use serde_json::json;
use tokio::sync::broadcast;

/// Reads a header as a string. Empty and non-UTF-8 values count as absent.
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    header(headers, SESSION_TOKEN_HEADER).map(SessionToken::new)
}

fn error_body(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

/// Maps a party error to a response. Rejections keep the occupancy in the
/// body because clients refresh the displayed party from it.
fn party_error(err: PartyError) -> Response {
    match err {
        PartyError::Rejected { reason, occupancy } => {
            let (status, body) = match reason {
                SessionError::PartyFull { .. } => (
                    StatusCode::FORBIDDEN,
                    AuthenticateResponse::rejected(occupancy, reason.to_string()),
                ),
                SessionError::InvalidPasskey => (
                    StatusCode::UNAUTHORIZED,
                    AuthenticateResponse::rejected(occupancy, reason.to_string()),
                ),
                SessionError::UnknownToken => (
                    StatusCode::UNAUTHORIZED,
                    AuthenticateResponse::session_invalid(occupancy, reason.to_string()),
                ),
            };
            (status, Json(body)).into_response()
        }
        PartyError::RequestLimitReached { stats, .. } => {
            (StatusCode::TOO_MANY_REQUESTS, Json(stats)).into_response()
        }
        PartyError::Unavailable => error_body(StatusCode::SERVICE_UNAVAILABLE, err),
    }
}

// ---------------------------------------------------------------------------
// Party endpoints
// ---------------------------------------------------------------------------

/// `POST /party/authenticate`
///
/// `refresh: true` in the body turns this into a check of the presented
/// session that never takes a slot.
pub(crate) async fn authenticate(
    State(party): State<PartyHandle>,
    headers: HeaderMap,
    Json(request): Json<AuthenticateRequest>,
) -> Response {
    let token = session_token(&headers);
    let result = if request.refresh {
        party.refresh(request.passkey, token).await
    } else {
        party.authenticate(request.passkey, token).await
    };
    match result {
        Ok(body) => {
            tracing::debug!(role = ?body.role, "authenticated");
            Json(body).into_response()
        }
        Err(e) => party_error(e),
    }
}

/// `GET /party/status`
pub(crate) async fn status(
    State(party): State<PartyHandle>,
    headers: HeaderMap,
) -> Response {
    match party.status(session_token(&headers)).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => party_error(e),
    }
}

/// `POST /party/logout`
pub(crate) async fn logout(
    State(party): State<PartyHandle>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = session_token(&headers) else {
        return error_body(
            StatusCode::BAD_REQUEST,
            format!("missing {SESSION_TOKEN_HEADER} header"),
        );
    };
    match party.logout(token).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => party_error(e),
    }
}

// ---------------------------------------------------------------------------
// Tracker, admin, health
// ---------------------------------------------------------------------------

/// `POST /track-request`
pub(crate) async fn track_request(State(party): State<PartyHandle>) -> Response {
    match party.track_request().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => party_error(e),
    }
}

/// `GET /admin/stats`
pub(crate) async fn admin_stats(
    State(party): State<PartyHandle>,
    headers: HeaderMap,
) -> Response {
    let Some(passkey) = header(&headers, PASSKEY_HEADER) else {
        return error_body(
            StatusCode::UNAUTHORIZED,
            format!("missing {PASSKEY_HEADER} header"),
        );
    };
    match party.admin_stats(passkey).await {
        Ok(stats) => Json(stats).into_response(),
        Err(PartyError::Rejected { reason, .. }) => {
            error_body(StatusCode::UNAUTHORIZED, reason)
        }
        Err(e) => party_error(e),
    }
}

/// `GET /health`
pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

/// `GET /party/events` (WebSocket upgrade)
pub(crate) async fn events(
    State(party): State<PartyHandle>,
    ws: WebSocketUpgrade,
) -> Response {
    let rx = party.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, party, rx))
}

/// Pushes party events to one subscriber until either side goes away.
async fn forward_events(
    mut socket: WebSocket,
    party: PartyHandle,
    mut rx: broadcast::Receiver<PartyEvent>,
) {
    tracing::debug!("event subscriber connected");
    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Clients poll on any event, so the current
                        // occupancy stands in for everything skipped.
                        tracing::debug!(skipped, "event subscriber lagged");
                        match party.occupancy().await {
                            Ok(occupancy) => PartyEvent::Occupancy(occupancy),
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to encode party event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // Subscribers have nothing to say; pings are answered
                    // by axum.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    tracing::debug!("event subscriber disconnected");
}
