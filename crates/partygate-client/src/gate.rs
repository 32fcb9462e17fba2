//! The access gate: passkey submission and explicit logout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use partygate_protocol::{PartyStatus, Role};
use partygate_transport::{AuthReply, PartyApi};

use crate::{GateError, SessionContext};

/// Successful outcome of [`AccessGate::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A role was granted. Only a Host gets past the gate.
    Admitted { role: Role, status: PartyStatus },
    /// Correct passkey, but every slot is taken. Not an error: the caller
    /// shows the full party and stays at the gate.
    Rejected { status: PartyStatus },
}

impl Admission {
    pub fn role(&self) -> Role {
        match self {
            Self::Admitted { role, .. } => *role,
            Self::Rejected { .. } => Role::Unauthenticated,
        }
    }

    pub fn status(&self) -> &PartyStatus {
        match self {
            Self::Admitted { status, .. } | Self::Rejected { status } => status,
        }
    }
}

/// Clears the in-flight flag however the submission ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The visible gatekeeper.
pub struct AccessGate<A: PartyApi> {
    api: Arc<A>,
    context: Arc<SessionContext>,
    in_flight: AtomicBool,
}

impl<A: PartyApi> AccessGate<A> {
    pub fn new(api: Arc<A>, context: Arc<SessionContext>) -> Self {
        Self {
            api,
            context,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// `true` unless the client is an admitted Host.
    pub fn gate_visible(&self) -> bool {
        self.context.gate_visible()
    }

    /// `true` while a submission is outstanding.
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submits `passkey`, presenting the stored token if there is one so a
    /// returning client keeps its slot.
    ///
    /// # Errors
    /// - [`GateError::SubmissionInFlight`] if another submit is outstanding
    /// - [`GateError::InvalidPasskey`] on `401`
    /// - [`GateError::Transport`] when the service is unreachable
    /// - [`GateError::Superseded`] if a logout raced the request
    ///
    /// None of these touch the stored token.
    pub async fn submit(&self, passkey: &str) -> Result<Admission, GateError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("duplicate passkey submission suppressed");
            return Err(GateError::SubmissionInFlight);
        }
        let _in_flight = InFlight(&self.in_flight);

        let token = self.context.token()?;
        let intent = self.context.begin_submission();

        let reply = match self.api.authenticate(passkey, token.as_ref()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "authentication request failed");
                self.context.end_submission(&intent);
                return Err(e.into());
            }
        };

        match reply {
            AuthReply::Admitted(body) => {
                if !self.context.apply_authenticated(&intent, &body)? {
                    return Err(GateError::Superseded);
                }
                let role = Role::from_wire(body.role);
                tracing::info!(%role, "admitted at gate");
                Ok(Admission::Admitted {
                    role,
                    status: PartyStatus::from_authenticate(&body),
                })
            }
            AuthReply::InvalidPasskey(body) => {
                self.context.apply_rejected(&intent, &body);
                Err(GateError::InvalidPasskey)
            }
            AuthReply::PartyFull(body) => {
                self.context.apply_rejected(&intent, &body);
                tracing::info!(
                    total = body.occupancy.total_users,
                    "party full, staying at gate"
                );
                Ok(Admission::Rejected {
                    status: PartyStatus::from_authenticate(&body),
                })
            }
            AuthReply::SessionInvalid(body) => {
                // Only refresh calls are answered this way.
                self.context.apply_rejected(&intent, &body);
                Ok(Admission::Rejected {
                    status: PartyStatus::from_authenticate(&body),
                })
            }
        }
    }

    /// Explicit logout.
    ///
    /// Local state is cleared first (marker, token, role, gate, epoch), so
    /// any response still in flight is ignored. The server call is best
    /// effort: a failure is logged and otherwise ignored.
    pub async fn logout(&self) -> Result<(), GateError> {
        let Some(token) = self.context.logout()? else {
            return Ok(());
        };
        if let Err(e) = self.api.logout(&token).await {
            tracing::warn!(error = %e, "logout request failed, continuing");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admitted, full, invalid, Call, ScriptedApi};
    use crate::{GateState, MemorySessionStore, SessionStore};
    use partygate_protocol::SessionToken;
    use partygate_transport::TransportError;

    fn gate() -> (Arc<ScriptedApi>, Arc<MemorySessionStore>, AccessGate<ScriptedApi>) {
        let api = Arc::new(ScriptedApi::new());
        let store = Arc::new(MemorySessionStore::new());
        let context = SessionContext::shared(store.clone());
        (api.clone(), store, AccessGate::new(api, context))
    }

    // =====================================================================
    // submit()
    // =====================================================================

    #[tokio::test]
    async fn test_submit_host_hides_gate_and_stores_token() {
        let (api, store, gate) = gate();
        api.push_auth(Ok(admitted(Role::Host, "host-tok", 1)));

        let admission = gate.submit("welcome").await.unwrap();

        assert_eq!(admission.role(), Role::Host);
        assert!(!gate.gate_visible());
        assert_eq!(store.token().unwrap(), Some(SessionToken::new("host-tok")));
    }

    #[tokio::test]
    async fn test_submit_guest_keeps_gate_visible() {
        let (api, _, gate) = gate();
        api.push_auth(Ok(admitted(Role::Guest, "g", 2)));

        let admission = gate.submit("welcome").await.unwrap();

        assert_eq!(admission.role(), Role::Guest);
        assert!(gate.gate_visible());
        assert_eq!(gate.context().view().gate, GateState::Admitted(Role::Guest));
    }

    #[tokio::test]
    async fn test_submit_presents_stored_token() {
        let (api, store, gate) = gate();
        store.set_token(&SessionToken::new("old")).unwrap();
        api.push_auth(Ok(admitted(Role::Guest, "old", 2)));

        gate.submit("welcome").await.unwrap();

        assert_eq!(
            api.calls(),
            vec![Call::Authenticate {
                passkey: "welcome".into(),
                token: Some(SessionToken::new("old")),
            }]
        );
    }

    #[tokio::test]
    async fn test_submit_invalid_passkey_leaves_token_untouched() {
        let (api, store, gate) = gate();
        store.set_token(&SessionToken::new("keep")).unwrap();
        api.push_auth(Ok(invalid(1)));

        let err = gate.submit("wrong").await.unwrap_err();

        assert!(matches!(err, GateError::InvalidPasskey));
        assert_eq!(store.token().unwrap(), Some(SessionToken::new("keep")));
        assert_eq!(gate.context().view().gate, GateState::Locked);
        assert!(!gate.is_submitting());
    }

    #[tokio::test]
    async fn test_submit_full_party_is_rejected_admission() {
        let (api, store, gate) = gate();
        api.push_auth(Ok(full()));

        let admission = gate.submit("welcome").await.unwrap();

        match admission {
            Admission::Rejected { status } => {
                assert!(status.occupancy.is_full);
                assert_eq!(status.occupancy.tank_level, 100);
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert_eq!(store.token().unwrap(), None);
        assert!(gate.gate_visible());
    }

    #[tokio::test]
    async fn test_submit_network_failure_leaves_token_untouched() {
        let (api, store, gate) = gate();
        store.set_token(&SessionToken::new("keep")).unwrap();
        api.push_auth(Err(TransportError::Stream("offline".into())));

        let err = gate.submit("welcome").await.unwrap_err();

        assert!(matches!(err, GateError::Transport(_)));
        assert_eq!(store.token().unwrap(), Some(SessionToken::new("keep")));
        assert_eq!(gate.context().view().gate, GateState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_submit_is_suppressed() {
        let (api, _, gate) = gate();
        let release = api.push_auth_gated();

        let first = gate.submit("welcome");
        let second = async {
            tokio::task::yield_now().await;
            let result = gate.submit("welcome").await;
            release.send(Ok(admitted(Role::Host, "h", 1))).ok();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(GateError::SubmissionInFlight)));
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_racing_logout_is_superseded() {
        let (api, store, gate) = gate();
        let release = api.push_auth_gated();

        let submit = gate.submit("welcome");
        let logout = async {
            tokio::task::yield_now().await;
            gate.context().logout().unwrap();
            release.send(Ok(admitted(Role::Host, "late", 1))).ok();
        };
        let (result, ()) = tokio::join!(submit, logout);

        assert!(matches!(result, Err(GateError::Superseded)));
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(gate.context().role(), Role::Unauthenticated);
    }

    // =====================================================================
    // logout()
    // =====================================================================

    #[tokio::test]
    async fn test_logout_clears_token_and_calls_server() {
        let (api, store, gate) = gate();
        api.push_auth(Ok(admitted(Role::Host, "h", 1)));
        gate.submit("welcome").await.unwrap();
        api.push_logout(Ok(()));

        gate.logout().await.unwrap();

        assert_eq!(store.token().unwrap(), None);
        assert!(store.logout_marker().unwrap().is_some());
        assert!(gate.gate_visible());
        assert_eq!(gate.context().role(), Role::Unauthenticated);
        assert!(api.calls().contains(&Call::Logout {
            token: SessionToken::new("h")
        }));
    }

    #[tokio::test]
    async fn test_logout_server_failure_is_ignored() {
        let (api, store, gate) = gate();
        store.set_token(&SessionToken::new("h")).unwrap();
        api.push_logout(Err(TransportError::Stream("offline".into())));

        gate.logout().await.unwrap();

        assert_eq!(store.token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_without_token_skips_server() {
        let (api, _, gate) = gate();

        gate.logout().await.unwrap();

        assert!(api.calls().is_empty());
    }
}
