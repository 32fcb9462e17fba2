//! Party actor: the single Tokio task that owns all party state.
//!
//! Every operation arrives as a [`PartyCommand`] on a bounded mpsc channel
//! and is answered on a oneshot. Because only this task ever touches the
//! [`SessionManager`], two concurrent correct-passkey authentications can
//! never both observe "no Host yet".

use partygate_protocol::{
    AdminStats, AuthenticateResponse, LogoutResponse, Occupancy, PartyEvent,
    PartyStatus, SessionToken, TrackerStats,
};
use partygate_session::{
    LogoutOutcome, PasskeyVerifier, SessionError, SessionManager,
    SharedPasskey,
};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{PartyConfig, PartyError, PartyPhase, RequestTracker};

/// Commands sent to the party actor through its channel.
enum PartyCommand {
    Authenticate {
        passkey: String,
        token: Option<SessionToken>,
        refresh_only: bool,
        reply: oneshot::Sender<Result<AuthenticateResponse, PartyError>>,
    },
    Status {
        token: Option<SessionToken>,
        reply: oneshot::Sender<PartyStatus>,
    },
    Logout {
        token: SessionToken,
        reply: oneshot::Sender<LogoutResponse>,
    },
    Track {
        reply: oneshot::Sender<Result<TrackerStats, PartyError>>,
    },
    Stats {
        passkey: String,
        reply: oneshot::Sender<Result<AdminStats, PartyError>>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// PartyHandle
// ---------------------------------------------------------------------------

/// Handle to the running party actor.
///
/// Cheap to clone: an `mpsc::Sender` plus the broadcast sender used to
/// hand out event subscriptions without a round trip to the actor.
#[derive(Clone)]
pub struct PartyHandle {
    sender: mpsc::Sender<PartyCommand>,
    events: broadcast::Sender<PartyEvent>,
}

impl PartyHandle {
    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PartyCommand,
    ) -> Result<T, PartyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| PartyError::Unavailable)?;
        reply_rx.await.map_err(|_| PartyError::Unavailable)
    }

    /// Verifies `passkey`, then refreshes the session named by `token` or
    /// registers a new one.
    ///
    /// # Errors
    /// [`PartyError::Rejected`] with `InvalidPasskey` or `PartyFull`.
    pub async fn authenticate(
        &self,
        passkey: impl Into<String>,
        token: Option<SessionToken>,
    ) -> Result<AuthenticateResponse, PartyError> {
        let passkey = passkey.into();
        self.request(|reply| PartyCommand::Authenticate {
            passkey,
            token,
            refresh_only: false,
            reply,
        })
        .await?
    }

    /// Verifies `passkey`, then confirms the session named by `token`.
    /// Never registers a slot.
    ///
    /// # Errors
    /// [`PartyError::Rejected`] with `InvalidPasskey`, or `UnknownToken`
    /// when `token` is absent or names no live session.
    pub async fn refresh(
        &self,
        passkey: impl Into<String>,
        token: Option<SessionToken>,
    ) -> Result<AuthenticateResponse, PartyError> {
        let passkey = passkey.into();
        self.request(|reply| PartyCommand::Authenticate {
            passkey,
            token,
            refresh_only: true,
            reply,
        })
        .await?
    }

    /// Occupancy plus whether `token` still names a live session.
    pub async fn status(
        &self,
        token: Option<SessionToken>,
    ) -> Result<PartyStatus, PartyError> {
        self.request(|reply| PartyCommand::Status { token, reply })
            .await
    }

    /// Ends the session named by `token`. An unknown token is not an
    /// error; the response just says `reset: false`.
    pub async fn logout(
        &self,
        token: SessionToken,
    ) -> Result<LogoutResponse, PartyError> {
        self.request(|reply| PartyCommand::Logout { token, reply })
            .await
    }

    /// Records one `/track-request` hit.
    pub async fn track_request(&self) -> Result<TrackerStats, PartyError> {
        self.request(|reply| PartyCommand::Track { reply }).await?
    }

    /// Tracker counters plus occupancy, behind the admin passkey.
    pub async fn admin_stats(
        &self,
        passkey: impl Into<String>,
    ) -> Result<AdminStats, PartyError> {
        let passkey = passkey.into();
        self.request(|reply| PartyCommand::Stats { passkey, reply })
            .await?
    }

    /// Current occupancy (a status call with no token).
    pub async fn occupancy(&self) -> Result<Occupancy, PartyError> {
        Ok(self.status(None).await?.occupancy)
    }

    pub async fn phase(&self) -> Result<PartyPhase, PartyError> {
        Ok(PartyPhase::from_occupancy(&self.occupancy().await?))
    }

    /// Subscribes to occupancy and reset events.
    pub fn subscribe(&self) -> broadcast::Receiver<PartyEvent> {
        self.events.subscribe()
    }

    /// Tells the actor to stop. Later calls return `Unavailable`.
    pub async fn shutdown(&self) -> Result<(), PartyError> {
        self.sender
            .send(PartyCommand::Shutdown)
            .await
            .map_err(|_| PartyError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct PartyActor<V: PasskeyVerifier> {
    verifier: V,
    admin_passkey: SharedPasskey,
    sessions: SessionManager,
    tracker: RequestTracker,
    phase: PartyPhase,
    events: broadcast::Sender<PartyEvent>,
    receiver: mpsc::Receiver<PartyCommand>,
}

impl<V: PasskeyVerifier> PartyActor<V> {
    async fn run(mut self) {
        tracing::info!(
            max_users = self.sessions.config().max_users,
            "party actor started"
        );

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                PartyCommand::Authenticate {
                    passkey,
                    token,
                    refresh_only,
                    reply,
                } => {
                    let result = self
                        .handle_authenticate(&passkey, token, refresh_only)
                        .await;
                    let _ = reply.send(result);
                }
                PartyCommand::Status { token, reply } => {
                    let _ = reply.send(self.handle_status(token.as_ref()));
                }
                PartyCommand::Logout { token, reply } => {
                    let _ = reply.send(self.handle_logout(&token));
                }
                PartyCommand::Track { reply } => {
                    let _ = reply.send(self.handle_track());
                }
                PartyCommand::Stats { passkey, reply } => {
                    let _ = reply.send(self.handle_stats(&passkey));
                }
                PartyCommand::Shutdown => {
                    tracing::info!("party shutting down");
                    break;
                }
            }
        }

        tracing::info!("party actor stopped");
    }

    async fn handle_authenticate(
        &mut self,
        passkey: &str,
        token: Option<SessionToken>,
        refresh_only: bool,
    ) -> Result<AuthenticateResponse, PartyError> {
        if let Err(reason) = self.verifier.verify(passkey).await {
            tracing::debug!("authentication rejected: invalid passkey");
            return Err(self.rejected(reason));
        }

        let presented = token.as_ref().map(SessionToken::as_str);
        if refresh_only {
            let session = self
                .sessions
                .refresh(presented)
                .map_err(|reason| self.rejected(reason))?;
            return Ok(AuthenticateResponse::admitted(
                session.role,
                session.token.clone(),
                self.sessions.occupancy(),
            ));
        }

        let outcome = self
            .sessions
            .admit(presented)
            .map_err(|reason| self.rejected(reason))?;

        let occupancy = self.sessions.occupancy();
        if outcome.is_new() {
            self.occupancy_changed(occupancy);
        }

        let session = outcome.session();
        Ok(AuthenticateResponse::admitted(
            session.role,
            session.token.clone(),
            occupancy,
        ))
    }

    fn handle_status(&self, token: Option<&SessionToken>) -> PartyStatus {
        let session = token.and_then(|t| self.sessions.resolve(t.as_str()));
        PartyStatus {
            occupancy: self.sessions.occupancy(),
            session_valid: session.is_some(),
            role: session.map(|s| s.role),
        }
    }

    fn handle_logout(&mut self, token: &SessionToken) -> LogoutResponse {
        let outcome = self.sessions.logout(token.as_str());
        let occupancy = self.sessions.occupancy();

        match outcome {
            LogoutOutcome::UnknownToken => {
                tracing::debug!(%token, "logout with unknown token ignored");
            }
            LogoutOutcome::SlotReleased => self.occupancy_changed(occupancy),
            LogoutOutcome::PartyReset { invalidated } => {
                tracing::info!(%token, invalidated, "party reset by logout");
                self.phase = PartyPhase::from_occupancy(&occupancy);
                let _ = self.events.send(PartyEvent::Reset);
            }
        }

        LogoutResponse {
            reset: outcome.changed(),
            occupancy,
        }
    }

    fn handle_track(&mut self) -> Result<TrackerStats, PartyError> {
        self.tracker.track().map_err(|stats| {
            tracing::warn!(limit = self.tracker.limit(), "request limit reached");
            PartyError::RequestLimitReached {
                limit: self.tracker.limit(),
                stats,
            }
        })
    }

    fn handle_stats(&self, passkey: &str) -> Result<AdminStats, PartyError> {
        if !self.admin_passkey.matches(passkey) {
            tracing::warn!("admin stats rejected: invalid passkey");
            return Err(self.rejected(SessionError::InvalidPasskey));
        }
        Ok(AdminStats {
            tracker: self.tracker.stats(),
            party: self.sessions.occupancy(),
        })
    }

    fn rejected(&self, reason: SessionError) -> PartyError {
        PartyError::Rejected {
            reason,
            occupancy: self.sessions.occupancy(),
        }
    }

    /// Publishes the new occupancy and logs phase transitions.
    fn occupancy_changed(&mut self, occupancy: Occupancy) {
        let phase = PartyPhase::from_occupancy(&occupancy);
        if phase != self.phase {
            tracing::info!(from = %self.phase, to = %phase, "party phase changed");
            self.phase = phase;
        }
        // No subscribers is fine.
        let _ = self.events.send(PartyEvent::Occupancy(occupancy));
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawns the party actor with the exact-match [`SharedPasskey`] taken
/// from `config.passkey`.
pub fn spawn_party(config: PartyConfig) -> PartyHandle {
    let verifier = SharedPasskey::new(config.passkey.clone());
    spawn_party_with_verifier(config, verifier)
}

/// Spawns the party actor with a custom passkey check.
///
/// Must be called inside a Tokio runtime.
pub fn spawn_party_with_verifier<V: PasskeyVerifier>(
    config: PartyConfig,
    verifier: V,
) -> PartyHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let (events, _) = broadcast::channel(config.event_capacity.max(1));

    let sessions = SessionManager::new(config.session_config());
    let phase = PartyPhase::from_occupancy(&sessions.occupancy());

    let actor = PartyActor {
        verifier,
        admin_passkey: SharedPasskey::new(config.effective_admin_passkey()),
        sessions,
        tracker: RequestTracker::new(config.request_limit),
        phase,
        events: events.clone(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    PartyHandle { sender: tx, events }
}
