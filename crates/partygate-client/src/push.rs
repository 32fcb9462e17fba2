//! Push-driven refresh: turns `/party/events` messages into immediate polls.
//!
//! Events never change session state directly. Each one only asks the
//! poller to check `/party/status` now instead of at the next tick, so a
//! Guest learns about a Host logout within one round trip.

use std::time::Duration;

use partygate_transport::EventStream;
use tokio::task::JoinHandle;

use crate::RefreshTrigger;

/// Delay before reconnecting after the stream fails or closes.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Watches the event stream at `url` and fires `trigger` on every event.
///
/// Reconnects after [`RECONNECT_DELAY`] whenever the stream ends. The task
/// exits on its own once the poller behind `trigger` is gone.
pub fn watch_events(url: impl Into<String>, trigger: RefreshTrigger) -> JoinHandle<()> {
    let url = url.into();
    tokio::spawn(async move {
        while !trigger.is_closed() {
            match EventStream::connect(&url).await {
                Ok(mut stream) => {
                    if forward(&mut stream, &trigger).await {
                        stream.close().await;
                        return;
                    }
                }
                Err(e) => tracing::debug!(url = %url, error = %e, "event stream unavailable"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

/// Forwards events until the stream ends. Returns `true` if the poller
/// went away.
async fn forward(stream: &mut EventStream, trigger: &RefreshTrigger) -> bool {
    loop {
        match stream.next_event().await {
            Ok(Some(event)) => {
                tracing::debug!(?event, "party event, refreshing status");
                if !trigger.fire() {
                    return true;
                }
            }
            Ok(None) => {
                tracing::debug!("event stream closed by server");
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, "event stream failed");
                return false;
            }
        }
    }
}
