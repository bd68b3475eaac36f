//! Per-session admission rate window
//!
//! Sliding window over admission timestamps; entries falling out of the
//! window are pruned lazily on each check, so the deque never outgrows the
//! cap plus the in-flight checks of one window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub(super) struct RateWindow {
    admissions: VecDeque<Instant>,
}

impl RateWindow {
    /// Prune entries older than `window` and return how many remain.
    pub fn admitted_within(&mut self, now: Instant, window: Duration) -> usize {
        if let Some(cutoff) = now.checked_sub(window) {
            while self
                .admissions
                .front()
                .is_some_and(|&admitted| admitted <= cutoff)
            {
                self.admissions.pop_front();
            }
        }
        self.admissions.len()
    }

    /// Consume one admission slot.
    pub fn record(&mut self, now: Instant) {
        self.admissions.push_back(now);
    }
}
