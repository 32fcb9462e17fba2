//! The shared client session context.
//!
//! One `SessionContext` per client, injected as `Arc` into the gate, the
//! poller and the router. It is the only writer of the stored token and
//! the only place role and last-known status live.
//!
//! # Ordering guards
//!
//! Every request takes a [`RequestIntent`] before it is sent:
//!
//! - **epoch**: bumped by logout and by server-side invalidation. A
//!   response whose epoch is older than the context's is dropped whole, so
//!   a retry that was in flight across a logout cannot re-admit the client.
//! - **seq**: monotonic per context. A status response older than the last
//!   applied one is dropped, so a slow poll cannot overwrite a newer view.
//! - **scope**: an optional [`CancelScope`]. Once cancelled (poller
//!   teardown), responses carrying it are dropped.
//!
//! All three are checked under the same lock that guards the writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use partygate_protocol::{AuthenticateResponse, PartyStatus, Role, SessionToken};
use tokio::sync::watch;

use crate::store::epoch_millis;
use crate::{SessionStore, StoreError};

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// What the gate is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// Waiting for a passkey.
    #[default]
    Locked,
    /// A submission is in flight.
    Authenticating,
    /// The last authentication admitted the client with this role.
    Admitted(Role),
}

/// Snapshot of everything a UI would render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientView {
    pub role: Role,
    pub gate: GateState,
    /// Last applied status, `None` until the first response.
    pub status: Option<PartyStatus>,
}

impl ClientView {
    /// The gate stays up for everyone except an admitted Host.
    pub fn gate_visible(&self) -> bool {
        !matches!(self.gate, GateState::Admitted(Role::Host))
    }
}

// ---------------------------------------------------------------------------
// Request bookkeeping
// ---------------------------------------------------------------------------

/// A flag that, once set, makes every response tagged with it ignorable.
#[derive(Debug, Clone, Default)]
pub struct CancelScope(Arc<AtomicBool>);

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Captured when a request is issued, presented when its response is
/// applied.
#[derive(Debug, Clone)]
pub struct RequestIntent {
    epoch: u64,
    seq: u64,
    scope: Option<CancelScope>,
}

impl RequestIntent {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Result of [`SessionContext::apply_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusApplied {
    /// The view now shows this status.
    Applied,
    /// The server no longer knows the presented token. Token cleared, role
    /// reset, gate relocked.
    Invalidated,
    /// Dropped: older than the last applied status, issued before a
    /// logout, or its scope was cancelled.
    Ignored,
}

struct Inner {
    view: ClientView,
    epoch: u64,
    next_seq: u64,
    last_applied_seq: u64,
    /// Gate state to restore when a submission fails.
    gate_before_submit: GateState,
}

impl Inner {
    fn is_current(&self, intent: &RequestIntent) -> bool {
        intent.epoch == self.epoch
            && !intent.scope.as_ref().is_some_and(CancelScope::is_cancelled)
    }

    /// Replaces the displayed status if `intent` is the newest so far.
    fn offer_status(&mut self, intent: &RequestIntent, status: PartyStatus) -> bool {
        if intent.seq < self.last_applied_seq {
            return false;
        }
        self.last_applied_seq = intent.seq;
        self.view.status = Some(status);
        true
    }

    fn lock_gate(&mut self) {
        self.view.role = Role::Unauthenticated;
        self.view.gate = GateState::Locked;
        self.epoch += 1;
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// Shared client session state.
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    inner: Mutex<Inner>,
    view_tx: watch::Sender<ClientView>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (view_tx, _) = watch::channel(ClientView::default());
        Self {
            store,
            inner: Mutex::new(Inner {
                view: ClientView::default(),
                epoch: 0,
                next_seq: 1,
                last_applied_seq: 0,
                gate_before_submit: GateState::Locked,
            }),
            view_tx,
        }
    }

    /// `new` wrapped in an `Arc`, the form every component takes.
    pub fn shared(store: Arc<dyn SessionStore>) -> Arc<Self> {
        Arc::new(Self::new(store))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the view while the lock is still held, so watchers never
    /// observe views out of order.
    fn publish(&self, inner: &Inner) {
        self.view_tx.send_replace(inner.view.clone());
    }

    // -- Reads ------------------------------------------------------------

    pub fn view(&self) -> ClientView {
        self.lock().view.clone()
    }

    /// Receives every view change.
    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view_tx.subscribe()
    }

    pub fn role(&self) -> Role {
        self.lock().view.role
    }

    pub fn status(&self) -> Option<PartyStatus> {
        self.lock().view.status.clone()
    }

    pub fn gate_visible(&self) -> bool {
        self.lock().view.gate_visible()
    }

    /// The stored token.
    pub fn token(&self) -> Result<Option<SessionToken>, StoreError> {
        let _inner = self.lock();
        self.store.token()
    }

    /// Current epoch. Changes on logout and invalidation.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    // -- Request bookkeeping ---------------------------------------------

    /// Tags a request about to be sent.
    pub fn begin_request(&self) -> RequestIntent {
        self.intent(None)
    }

    /// Tags a request whose response is dropped once `scope` is cancelled.
    pub fn begin_scoped_request(&self, scope: &CancelScope) -> RequestIntent {
        self.intent(Some(scope.clone()))
    }

    fn intent(&self, scope: Option<CancelScope>) -> RequestIntent {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        RequestIntent {
            epoch: inner.epoch,
            seq,
            scope,
        }
    }

    /// Cancels `scope`. After this returns, no response tagged with it
    /// will change the context.
    pub fn cancel(&self, scope: &CancelScope) {
        let _inner = self.lock();
        scope.0.store(true, Ordering::Release);
    }

    /// Shows the gate as authenticating and tags the submission.
    pub fn begin_submission(&self) -> RequestIntent {
        let intent = self.begin_request();
        let mut inner = self.lock();
        inner.gate_before_submit = inner.view.gate;
        inner.view.gate = GateState::Authenticating;
        self.publish(&inner);
        intent
    }

    /// Restores the gate after a submission that produced no admission.
    pub fn end_submission(&self, intent: &RequestIntent) {
        let mut inner = self.lock();
        if inner.is_current(intent) && inner.view.gate == GateState::Authenticating {
            inner.view.gate = inner.gate_before_submit;
            self.publish(&inner);
        }
    }

    // -- Applying responses ----------------------------------------------

    /// Applies a `200` authenticate response: persists the token, adopts
    /// the role, admits the gate.
    ///
    /// Returns `Ok(false)` (nothing changed) if the intent is stale.
    pub fn apply_authenticated(
        &self,
        intent: &RequestIntent,
        response: &AuthenticateResponse,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if !inner.is_current(intent) {
            tracing::debug!(seq = intent.seq, "stale authenticate response dropped");
            return Ok(false);
        }

        if let Some(token) = &response.token {
            self.store.set_token(token)?;
        }
        let role = Role::from_wire(response.role);
        inner.view.role = role;
        inner.view.gate = if role.is_admitted() {
            GateState::Admitted(role)
        } else {
            GateState::Locked
        };
        inner.offer_status(intent, PartyStatus::from_authenticate(response));
        self.publish(&inner);

        tracing::debug!(%role, seq = intent.seq, "authenticated");
        Ok(true)
    }

    /// Applies a `401`/`403` body: refreshes the displayed occupancy only.
    /// The token and role are left alone.
    pub fn apply_rejected(&self, intent: &RequestIntent, response: &AuthenticateResponse) {
        let mut inner = self.lock();
        if !inner.is_current(intent) {
            return;
        }
        let status = PartyStatus {
            occupancy: response.occupancy,
            session_valid: false,
            role: None,
        };
        if inner.view.gate == GateState::Authenticating {
            inner.view.gate = inner.gate_before_submit;
        }
        inner.offer_status(intent, status);
        self.publish(&inner);
    }

    /// Applies a status poll response.
    ///
    /// `presented` is the token sent with the request. If the server says
    /// `sessionValid=false` for a token that is still the stored one, the
    /// client is logged out locally.
    pub fn apply_status(
        &self,
        intent: &RequestIntent,
        status: PartyStatus,
        presented: Option<&SessionToken>,
    ) -> Result<StatusApplied, StoreError> {
        let mut inner = self.lock();
        if !inner.is_current(intent) || intent.seq < inner.last_applied_seq {
            return Ok(StatusApplied::Ignored);
        }

        if let Some(presented) = presented {
            if !status.session_valid {
                let stored = self.store.token()?;
                if stored.as_ref() == Some(presented) {
                    self.store.clear_token()?;
                    inner.lock_gate();
                    inner.offer_status(intent, status);
                    self.publish(&inner);
                    tracing::info!(token = %presented, "session invalidated by server");
                    return Ok(StatusApplied::Invalidated);
                }
            } else if let Some(role) = status.role {
                inner.view.role = role;
            }
        }

        inner.offer_status(intent, status);
        self.publish(&inner);
        Ok(StatusApplied::Applied)
    }

    /// Applies a refresh that found the presented session gone. Same
    /// effect as a status poll answering `sessionValid=false` for it.
    pub fn apply_session_invalid(
        &self,
        intent: &RequestIntent,
        response: &AuthenticateResponse,
        presented: &SessionToken,
    ) -> Result<StatusApplied, StoreError> {
        let status = PartyStatus {
            occupancy: response.occupancy,
            session_valid: false,
            role: None,
        };
        self.apply_status(intent, status, Some(presented))
    }

    // -- Local transitions -----------------------------------------------

    /// Local half of an explicit logout: records the logout marker,
    /// clears the token, resets role, relocks the gate, bumps the epoch.
    ///
    /// Returns the token that was stored so the caller can tell the server.
    pub fn logout(&self) -> Result<Option<SessionToken>, StoreError> {
        let mut inner = self.lock();
        self.store.set_logout_marker(epoch_millis())?;
        let token = self.store.token()?;
        self.store.clear_token()?;
        inner.lock_gate();
        self.publish(&inner);
        tracing::info!("logged out locally");
        Ok(token)
    }

    /// Consumes a logout marker younger than `window`.
    ///
    /// Returns `true` (and relocks the gate) when the client logged out
    /// within the window, meaning silent re-authentication must be skipped.
    /// An expired marker is cleared and `false` returned.
    pub fn take_recent_logout(&self, window: Duration) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let Some(at) = self.store.logout_marker()? else {
            return Ok(false);
        };
        self.store.clear_logout_marker()?;

        let age = epoch_millis().saturating_sub(at);
        if age < window.as_millis() as u64 {
            inner.view.gate = GateState::Locked;
            self.publish(&inner);
            tracing::debug!(age_ms = age, "recent logout, skipping silent auth");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
