//! Background party status poller.
//!
//! Lifecycle of one activation:
//!
//! ```text
//! activate() ─→ [debounce 100 ms] ─→ startup ─→ [tick every 5 s] ─→ poll ─┐
//!                                                    ▲                     │
//!                                                    └─────────────────────┘
//! teardown() / drop: abort task, cancel scope (no update after this point)
//! ```
//!
//! Startup either consumes a recent logout marker (and does nothing else)
//! or, when a token is stored, silently refreshes it with the well-known
//! passkey so role and status are fresh before the first tick. The refresh
//! never takes a slot: a token the server no longer knows is cleared and
//! the gate relocked, exactly as a failed status poll would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use partygate_protocol::DEFAULT_PASSKEY;
use partygate_tick::{TickConfig, TickScheduler};
use partygate_transport::{AuthReply, PartyApi};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{CancelScope, ClientError, SessionContext, StatusApplied};

/// Poller timing and the passkey used for silent re-authentication.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between activation and startup. A teardown inside this window
    /// means nothing was sent at all.
    pub activation_debounce: Duration,
    /// How long after an explicit logout silent re-authentication is
    /// suppressed.
    pub logout_grace: Duration,
    /// Poll cadence.
    pub tick: TickConfig,
    pub silent_passkey: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            activation_debounce: Duration::from_millis(100),
            logout_grace: Duration::from_secs(2),
            tick: TickConfig::default(),
            silent_passkey: DEFAULT_PASSKEY.to_string(),
        }
    }
}

/// Owns at most one live polling task per gate.
pub struct PartyStatusPoller<A: PartyApi> {
    api: Arc<A>,
    context: Arc<SessionContext>,
    config: PollerConfig,
    active: Arc<AtomicBool>,
}

impl<A: PartyApi> PartyStatusPoller<A> {
    pub fn new(api: Arc<A>, context: Arc<SessionContext>) -> Self {
        Self::with_config(api, context, PollerConfig::default())
    }

    pub fn with_config(
        api: Arc<A>,
        context: Arc<SessionContext>,
        config: PollerConfig,
    ) -> Self {
        Self {
            api,
            context,
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Starts polling.
    ///
    /// # Errors
    /// [`ClientError::AlreadyActive`] while a previous handle is alive.
    pub fn activate(&self) -> Result<PollerHandle, ClientError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::AlreadyActive);
        }

        let scope = CancelScope::new();
        // One slot: a hint arriving while one is pending adds nothing.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);

        let task = tokio::spawn(run(
            self.api.clone(),
            self.context.clone(),
            self.config.clone(),
            scope.clone(),
            refresh_rx,
        ));

        tracing::debug!("status poller activated");
        Ok(PollerHandle {
            task: Some(task),
            scope,
            refresh: RefreshTrigger(refresh_tx),
            context: self.context.clone(),
            active: self.active.clone(),
        })
    }
}

/// Requests an immediate out-of-band poll. Cloneable; used by the push
/// watcher.
#[derive(Debug, Clone)]
pub struct RefreshTrigger(mpsc::Sender<()>);

impl RefreshTrigger {
    /// Returns `false` once the poller is gone.
    pub fn fire(&self) -> bool {
        match self.0.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// A live activation. Dropping it is the same as [`teardown`](Self::teardown).
pub struct PollerHandle {
    task: Option<JoinHandle<()>>,
    scope: CancelScope,
    refresh: RefreshTrigger,
    context: Arc<SessionContext>,
    active: Arc<AtomicBool>,
}

impl PollerHandle {
    /// Polls now instead of waiting for the next tick. Ignored before
    /// startup has finished.
    pub fn refresh_now(&self) {
        self.refresh.fire();
    }

    pub fn refresher(&self) -> RefreshTrigger {
        self.refresh.clone()
    }

    /// Stops the timers and makes any in-flight response ignorable.
    pub fn teardown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.context.cancel(&self.scope);
        task.abort();
        self.active.store(false, Ordering::Release);
        tracing::debug!("status poller torn down");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Task body
// ---------------------------------------------------------------------------

async fn run<A: PartyApi>(
    api: Arc<A>,
    context: Arc<SessionContext>,
    config: PollerConfig,
    scope: CancelScope,
    mut refresh_rx: mpsc::Receiver<()>,
) {
    tokio::time::sleep(config.activation_debounce).await;

    startup(api.as_ref(), &context, &config, &scope).await;

    // Hints that arrived during startup are covered by it.
    while refresh_rx.try_recv().is_ok() {}

    let mut scheduler = TickScheduler::new(config.tick.clone());
    loop {
        tokio::select! {
            Some(()) = refresh_rx.recv() => scheduler.trigger_now(),
            info = scheduler.wait_for_tick() => {
                tracing::trace!(tick = info.tick, triggered = info.triggered, "status poll");
                poll_once(api.as_ref(), &context, &scope).await;
            }
        }
    }
}

async fn startup<A: PartyApi>(
    api: &A,
    context: &SessionContext,
    config: &PollerConfig,
    scope: &CancelScope,
) {
    match context.take_recent_logout(config.logout_grace) {
        Ok(true) => {
            tracing::info!("skipping silent re-authentication after logout");
            return;
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "could not read logout marker"),
    }

    let token = match context.token() {
        Ok(Some(token)) => token,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "could not read stored token");
            return;
        }
    };

    let intent = context.begin_scoped_request(scope);
    match api.refresh(&config.silent_passkey, &token).await {
        Ok(AuthReply::Admitted(body)) => {
            if let Err(e) = context.apply_authenticated(&intent, &body) {
                tracing::warn!(error = %e, "could not persist refreshed token");
            }
        }
        Ok(AuthReply::SessionInvalid(body)) => {
            match context.apply_session_invalid(&intent, &body, &token) {
                Ok(StatusApplied::Invalidated) => {
                    tracing::info!(%token, "stored session ended while away, gate shown");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "could not clear stale token"),
            }
        }
        Ok(reply) => {
            // Still worth showing the occupancy of a full party.
            context.apply_rejected(&intent, reply.body());
        }
        Err(e) => tracing::warn!(error = %e, "silent refresh failed"),
    }
}

async fn poll_once<A: PartyApi>(api: &A, context: &SessionContext, scope: &CancelScope) {
    let token = match context.token() {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "could not read stored token");
            None
        }
    };

    let intent = context.begin_scoped_request(scope);
    let status = match api.status(token.as_ref()).await {
        Ok(status) => status,
        Err(e) => {
            tracing::debug!(error = %e, "status poll failed");
            return;
        }
    };

    match context.apply_status(&intent, status, token.as_ref()) {
        Ok(StatusApplied::Invalidated) => {
            tracing::info!("session ended remotely, gate shown");
        }
        Ok(StatusApplied::Ignored) => {
            tracing::trace!(seq = intent.seq(), "status response ignored");
        }
        Ok(StatusApplied::Applied) => {}
        Err(e) => tracing::warn!(error = %e, "could not apply status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admitted, full, session_invalid, status, Call, ScriptedApi};
    use crate::{GateState, MemorySessionStore, SessionStore};
    use partygate_protocol::{Role, SessionToken};

    struct Fixture {
        api: Arc<ScriptedApi>,
        store: Arc<MemorySessionStore>,
        context: Arc<SessionContext>,
        poller: PartyStatusPoller<ScriptedApi>,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(ScriptedApi::new());
        let store = Arc::new(MemorySessionStore::new());
        let context = SessionContext::shared(store.clone());
        let poller = PartyStatusPoller::new(api.clone(), context.clone());
        Fixture {
            api,
            store,
            context,
            poller,
        }
    }

    /// Lets spawned tasks run to their next await point.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        settle().await;
    }

    fn auth_calls(api: &ScriptedApi) -> usize {
        api.calls()
            .iter()
            .filter(|c| matches!(c, Call::Authenticate { .. } | Call::Refresh { .. }))
            .count()
    }

    fn status_calls(api: &ScriptedApi) -> usize {
        api.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status { .. }))
            .count()
    }

    // =====================================================================
    // activation
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_second_activation_is_rejected() {
        let f = fixture();
        let _handle = f.poller.activate().unwrap();

        assert!(matches!(f.poller.activate(), Err(ClientError::AlreadyActive)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivation_allowed_after_teardown() {
        let f = fixture();
        f.poller.activate().unwrap().teardown();

        assert!(!f.poller.is_active());
        assert!(f.poller.activate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_inside_debounce_sends_nothing() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("t")).unwrap();

        let first = f.poller.activate().unwrap();
        advance(50).await;
        first.teardown();
        let _second = f.poller.activate().unwrap();
        advance(150).await;

        // Only the second mount authenticated.
        assert_eq!(auth_calls(&f.api), 1);
    }

    // =====================================================================
    // startup
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_startup_with_token_silently_reauthenticates() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("t")).unwrap();
        f.api.push_auth(Ok(admitted(Role::Host, "t", 3)));

        let _handle = f.poller.activate().unwrap();
        advance(100).await;

        assert_eq!(
            f.api.calls(),
            vec![Call::Refresh {
                passkey: "welcome".into(),
                token: SessionToken::new("t"),
            }]
        );
        assert_eq!(f.context.role(), Role::Host);
        assert_eq!(f.context.status().unwrap().occupancy.total_users, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_with_dead_token_clears_it_and_relocks() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("stale")).unwrap();
        f.api.push_auth(Ok(session_invalid(0)));
        f.api.push_status(Ok(status(0, false, None)));

        let _handle = f.poller.activate().unwrap();
        advance(100).await;

        assert_eq!(f.store.token().unwrap(), None);
        assert_eq!(f.context.role(), Role::Unauthenticated);
        assert_eq!(f.context.view().gate, GateState::Locked);
        assert_eq!(f.context.status().unwrap().occupancy.total_users, 0);

        // Later polls go out without a token; nothing ever registers.
        advance(5_000).await;
        assert_eq!(
            f.api.calls()[1..],
            [Call::Status { token: None }]
        );
        assert!(!f
            .api
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Authenticate { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_without_token_skips_auth() {
        let f = fixture();
        let _handle = f.poller.activate().unwrap();
        advance(200).await;

        assert_eq!(auth_calls(&f.api), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_rejection_refreshes_status_only() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("t")).unwrap();
        f.api.push_auth(Ok(full()));

        let _handle = f.poller.activate().unwrap();
        advance(100).await;

        assert!(f.context.status().unwrap().occupancy.is_full);
        assert_eq!(f.store.token().unwrap(), Some(SessionToken::new("t")));
        assert_eq!(f.context.role(), Role::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_logout_skips_silent_auth_despite_token() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("stale")).unwrap();
        f.store
            .set_logout_marker(crate::store::epoch_millis())
            .unwrap();

        let _handle = f.poller.activate().unwrap();
        advance(100).await;

        assert_eq!(auth_calls(&f.api), 0);
        assert_eq!(f.store.logout_marker().unwrap(), None);
        assert!(f.context.gate_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_logout_marker_allows_silent_auth() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("t")).unwrap();
        f.store
            .set_logout_marker(crate::store::epoch_millis() - 10_000)
            .unwrap();
        f.api.push_auth(Ok(admitted(Role::Guest, "t", 2)));

        let _handle = f.poller.activate().unwrap();
        advance(100).await;

        assert_eq!(auth_calls(&f.api), 1);
    }

    // =====================================================================
    // polling
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_polls_every_five_seconds_after_startup() {
        let f = fixture();
        for n in 1..=3 {
            f.api.push_status(Ok(status(n, false, None)));
        }

        let _handle = f.poller.activate().unwrap();
        advance(100).await;
        assert_eq!(status_calls(&f.api), 0);

        advance(5_000).await;
        assert_eq!(status_calls(&f.api), 1);
        advance(5_000).await;
        advance(5_000).await;

        assert_eq!(status_calls(&f.api), 3);
        assert_eq!(f.context.status().unwrap().occupancy.total_users, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_session_clears_token_and_shows_gate() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("g")).unwrap();
        f.api.push_auth(Ok(admitted(Role::Guest, "g", 2)));
        f.api.push_status(Ok(status(0, false, None)));

        let _handle = f.poller.activate().unwrap();
        advance(100).await;
        assert_eq!(f.context.role(), Role::Guest);

        advance(5_000).await;

        assert_eq!(f.store.token().unwrap(), None);
        assert_eq!(f.context.role(), Role::Unauthenticated);
        assert_eq!(f.context.view().gate, GateState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_changes_nothing() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("g")).unwrap();
        f.api.push_auth(Ok(admitted(Role::Guest, "g", 2)));
        // Nothing scripted for status: the poll fails.

        let _handle = f.poller.activate().unwrap();
        advance(5_100).await;

        assert_eq!(status_calls(&f.api), 1);
        assert_eq!(f.store.token().unwrap(), Some(SessionToken::new("g")));
        assert_eq!(f.context.role(), Role::Guest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_polls_immediately() {
        let f = fixture();
        f.api.push_status(Ok(status(4, false, None)));

        let handle = f.poller.activate().unwrap();
        advance(100).await;
        handle.refresh_now();
        settle().await;

        assert_eq!(status_calls(&f.api), 1);
        assert_eq!(f.context.status().unwrap().occupancy.total_users, 4);
    }

    // =====================================================================
    // teardown
    // =====================================================================

    #[tokio::test(start_paused = true)]
    async fn test_no_update_after_teardown() {
        let f = fixture();
        f.store.set_token(&SessionToken::new("g")).unwrap();
        f.api.push_auth(Ok(admitted(Role::Guest, "g", 2)));
        let release = f.api.push_status_gated();

        let handle = f.poller.activate().unwrap();
        advance(5_100).await;
        assert_eq!(status_calls(&f.api), 1);

        handle.teardown();
        release.send(Ok(status(0, false, None))).ok();
        settle().await;

        // The invalidating response arrived after teardown and was dropped.
        assert_eq!(f.store.token().unwrap(), Some(SessionToken::new("g")));
        assert_eq!(f.context.role(), Role::Guest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let f = fixture();
        let handle = f.poller.activate().unwrap();
        advance(100).await;
        drop(handle);

        advance(20_000).await;

        assert_eq!(status_calls(&f.api), 0);
        assert!(!f.poller.is_active());
    }
}
