//! Scripted in-process [`PartyApi`] for the client state-machine tests.
//!
//! Responses are queued per endpoint. A queued response can be "gated":
//! the call blocks until the test releases it, which is how the tests
//! build the reload/logout/relogin races deterministically.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use partygate_protocol::{
    AuthenticateResponse, LogoutResponse, Occupancy, PartyStatus, Role,
    SessionToken,
};
use partygate_transport::{AuthReply, PartyApi, TransportError};
use tokio::sync::oneshot;

pub type Release<T> = oneshot::Sender<Result<T, TransportError>>;

enum Scripted<T> {
    Ready(Result<T, TransportError>),
    Gated(oneshot::Receiver<Result<T, TransportError>>),
}

impl<T> Scripted<T> {
    async fn resolve(self) -> Result<T, TransportError> {
        match self {
            Self::Ready(result) => result,
            Self::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(TransportError::Stream("released without reply".into()))),
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Authenticate {
        passkey: String,
        token: Option<SessionToken>,
    },
    Refresh {
        passkey: String,
        token: SessionToken,
    },
    Status {
        token: Option<SessionToken>,
    },
    Logout {
        token: SessionToken,
    },
}

/// Authenticate and refresh calls share one reply queue.
#[derive(Default)]
pub struct ScriptedApi {
    auth: Mutex<VecDeque<Scripted<AuthReply>>>,
    status: Mutex<VecDeque<Scripted<PartyStatus>>>,
    logout: Mutex<VecDeque<Scripted<LogoutResponse>>>,
    calls: Mutex<Vec<Call>>,
}

fn pop<T>(queue: &Mutex<VecDeque<Scripted<T>>>) -> Scripted<T> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
        .unwrap_or_else(|| Scripted::Ready(Err(TransportError::Stream("nothing scripted".into()))))
}

fn push<T>(queue: &Mutex<VecDeque<Scripted<T>>>, item: Scripted<T>) {
    queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(item);
}

fn gated<T>(queue: &Mutex<VecDeque<Scripted<T>>>) -> Release<T> {
    let (tx, rx) = oneshot::channel();
    push(queue, Scripted::Gated(rx));
    tx
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_auth(&self, reply: Result<AuthReply, TransportError>) {
        push(&self.auth, Scripted::Ready(reply));
    }

    pub fn push_auth_gated(&self) -> Release<AuthReply> {
        gated(&self.auth)
    }

    pub fn push_status(&self, status: Result<PartyStatus, TransportError>) {
        push(&self.status, Scripted::Ready(status));
    }

    pub fn push_status_gated(&self) -> Release<PartyStatus> {
        gated(&self.status)
    }

    pub fn push_logout(&self, result: Result<(), TransportError>) {
        let resp = result.map(|()| LogoutResponse {
            reset: true,
            occupancy: Occupancy::new(0, 5),
        });
        push(&self.logout, Scripted::Ready(resp));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

impl PartyApi for ScriptedApi {
    async fn authenticate(
        &self,
        passkey: &str,
        token: Option<&SessionToken>,
    ) -> Result<AuthReply, TransportError> {
        self.record(Call::Authenticate {
            passkey: passkey.to_string(),
            token: token.cloned(),
        });
        pop(&self.auth).resolve().await
    }

    async fn refresh(
        &self,
        passkey: &str,
        token: &SessionToken,
    ) -> Result<AuthReply, TransportError> {
        self.record(Call::Refresh {
            passkey: passkey.to_string(),
            token: token.clone(),
        });
        pop(&self.auth).resolve().await
    }

    async fn status(&self, token: Option<&SessionToken>) -> Result<PartyStatus, TransportError> {
        self.record(Call::Status {
            token: token.cloned(),
        });
        pop(&self.status).resolve().await
    }

    async fn logout(&self, token: &SessionToken) -> Result<LogoutResponse, TransportError> {
        self.record(Call::Logout {
            token: token.clone(),
        });
        pop(&self.logout).resolve().await
    }
}

// -- Canned bodies ----------------------------------------------------------

pub fn admitted(role: Role, token: &str, total: usize) -> AuthReply {
    AuthReply::Admitted(AuthenticateResponse::admitted(
        role,
        SessionToken::new(token),
        Occupancy::new(total, 5),
    ))
}

pub fn invalid(total: usize) -> AuthReply {
    AuthReply::InvalidPasskey(AuthenticateResponse::rejected(
        Occupancy::new(total, 5),
        "invalid passkey",
    ))
}

pub fn full() -> AuthReply {
    AuthReply::PartyFull(AuthenticateResponse::rejected(
        Occupancy::new(5, 5),
        "party is full",
    ))
}

pub fn session_invalid(total: usize) -> AuthReply {
    AuthReply::SessionInvalid(AuthenticateResponse::session_invalid(
        Occupancy::new(total, 5),
        "unknown session token",
    ))
}

pub fn status(total: usize, session_valid: bool, role: Option<Role>) -> PartyStatus {
    PartyStatus {
        occupancy: Occupancy::new(total, 5),
        session_valid,
        role,
    }
}
