//! Client-side party access state machines.
//!
//! Every component shares one [`SessionContext`], which owns the displayed
//! role and status and serializes writes to the [`SessionStore`]:
//!
//! ```text
//! AccessGate ──submit──→ PartyApi ──token──→ SessionContext ←──poll── PartyStatusPoller
//!                                                 ▲
//!                          RoleGatedRouter ──live check
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use partygate_client::{AccessGate, FileSessionStore, PartyStatusPoller, SessionContext};
//! use partygate_transport::HttpPartyApi;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(HttpPartyApi::new("http://127.0.0.1:3000")?);
//! let context = SessionContext::shared(Arc::new(FileSessionStore::new("session.json")));
//!
//! let poller = PartyStatusPoller::new(api.clone(), context.clone());
//! let _polling = poller.activate()?;
//!
//! let gate = AccessGate::new(api, context);
//! let admission = gate.submit("welcome").await?;
//! println!("role: {}", admission.role());
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod gate;
mod poller;
#[cfg(feature = "events")]
mod push;
mod router;
mod store;

#[cfg(test)]
mod testing;

pub use context::{
    CancelScope, ClientView, GateState, RequestIntent, SessionContext, StatusApplied,
};
pub use error::{ClientError, DenyReason, GateError, StoreError};
pub use gate::{AccessGate, Admission};
pub use poller::{PartyStatusPoller, PollerConfig, PollerHandle, RefreshTrigger};
#[cfg(feature = "events")]
pub use push::{watch_events, RECONNECT_DELAY};
pub use router::{Destination, RoleGatedRouter, Verified};
pub use store::{epoch_millis, FileSessionStore, MemorySessionStore, SessionStore};
