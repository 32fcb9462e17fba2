//! Fixed-interval poll scheduler for Partygate.
//!
//! Drives the client's status poll: one tick every `interval` (5 s by
//! default), with an optional out-of-band tick requested through
//! [`TickScheduler::trigger_now`] when a push hint says the party changed.
//!
//! # Integration
//!
//! The scheduler sits inside the poller's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(()) = refresh_rx.recv() => scheduler.trigger_now(),
//!         _ = scheduler.wait_for_tick() => poll_status().await,
//!     }
//! }
//! ```
//!
//! A tick that is missed because the previous poll was still running is
//! not replayed: the next deadline is a full interval after the late tick.
//! Polling is idempotent, so only the next one matters.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Full configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Delay before the first tick. `None` means one full interval, which
    /// matches a browser `setInterval`.
    pub initial_delay: Option<Duration>,
    /// Random extra delay (0..jitter) added to the first tick, so many
    /// clients opened together do not poll in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            initial_delay: None,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// The status poll period.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// Shortest interval accepted. Anything below is clamped up.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Config firing every `interval`.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "poll interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }

    /// Delay before the first tick, jitter included.
    pub fn first_delay(&self) -> Duration {
        let base = self.initial_delay.unwrap_or(self.interval);
        if self.initial_jitter.is_zero() {
            return base;
        }
        // Nanosecond resolution: any non-zero jitter gives a non-empty range.
        let max = u64::try_from(self.initial_jitter.as_nanos()).unwrap_or(u64::MAX);
        base + Duration::from_nanos(rand::rng().random_range(0..max))
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonic tick number, starting at 1.
    pub tick: u64,
    /// `true` if this tick came from `trigger_now` rather than the timer.
    pub triggered: bool,
    /// Deadlines that passed unobserved before this tick.
    pub missed: u64,
}

/// Counters kept across the scheduler's life.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub total_ticks: u64,
    pub triggered_ticks: u64,
    pub missed_ticks: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval scheduler. One per poller.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: Instant,
    trigger_pending: bool,
    stats: TickStats,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let next_tick = Instant::now() + config.first_delay();

        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "poll scheduler created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
            trigger_pending: false,
            stats: TickStats::default(),
        }
    }

    /// Wait until the next tick is due.
    ///
    /// Cancel-safe: dropping the future loses nothing, so it can sit in a
    /// `select!` branch.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.trigger_pending {
            self.trigger_pending = false;
            return self.fire(true, 0);
        }

        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = Instant::now();
        let interval = self.config.interval;
        let late_by = now.saturating_duration_since(deadline);
        let missed = (late_by.as_nanos() / interval.as_nanos()) as u64;
        self.next_tick = now + interval;
        if missed > 0 {
            debug!(
                tick = self.tick_count + 1,
                missed,
                "poll deadlines passed unobserved"
            );
        }

        self.fire(false, missed)
    }

    fn fire(&mut self, triggered: bool, missed: u64) -> TickInfo {
        self.tick_count += 1;
        self.stats.total_ticks += 1;
        self.stats.missed_ticks += missed;
        if triggered {
            self.stats.triggered_ticks += 1;
            // An out-of-band poll restarts the cadence.
            self.next_tick = Instant::now() + self.config.interval;
        }
        trace!(tick = self.tick_count, triggered, "tick fired");
        TickInfo {
            tick: self.tick_count,
            triggered,
            missed,
        }
    }

    /// Make the next `wait_for_tick` resolve immediately. Several calls
    /// before the tick is observed collapse into one.
    pub fn trigger_now(&mut self) {
        self.trigger_pending = true;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// When the timer will next fire.
    pub fn next_deadline(&self) -> Instant {
        self.next_tick
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}
