//! Short-lived identical-payload guard
//!
//! Keyed by raw payload text, scoped per session. An entry is created on the
//! first admitted scan, refreshed on every subsequent sighting, and evicted
//! once its last sighting falls out of the guard window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub(super) struct DedupCache {
    last_seen: HashMap<String, Instant>,
}

impl DedupCache {
    /// Elapsed time since the payload was last sighted, if within `window`.
    pub fn recent_sighting(
        &self,
        payload: &str,
        now: Instant,
        window: Duration,
    ) -> Option<Duration> {
        let last = self.last_seen.get(payload)?;
        let elapsed = now.saturating_duration_since(*last);
        (elapsed < window).then_some(elapsed)
    }

    /// Record a sighting.
    pub fn record(&mut self, payload: &str, now: Instant) {
        self.last_seen.insert(payload.to_string(), now);
    }

    /// Evict entries whose last sighting fell out of the window.
    pub fn prune(&mut self, now: Instant, window: Duration) {
        self.last_seen
            .retain(|_, last| now.saturating_duration_since(*last) < window);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }
}
