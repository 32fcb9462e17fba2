//! Bounded request counter behind `/track-request`.

use partygate_protocol::TrackerStats;

/// Counts hits up to a fixed limit.
#[derive(Debug, Clone)]
pub struct RequestTracker {
    count: u64,
    limit: u64,
}

impl RequestTracker {
    pub fn new(limit: u64) -> Self {
        Self { count: 0, limit }
    }

    /// Records one hit.
    ///
    /// Returns the updated stats, or `Err` with the unchanged stats when
    /// the limit was already reached.
    pub fn track(&mut self) -> Result<TrackerStats, TrackerStats> {
        if self.count >= self.limit {
            return Err(self.stats());
        }
        self.count += 1;
        Ok(self.stats())
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            current_count: self.count,
            remaining_requests: self.limit.saturating_sub(self.count),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}
