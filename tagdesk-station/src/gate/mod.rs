//! Scan admission gate
//!
//! Decides, per inbound scan, admit / reject-duplicate / reject-rate-limited.
//! Admission never fails with an error: it only returns a decision. What
//! happens after an admit (decode, persist, notify) is the caller's business,
//! and a later persistence failure does not retroactively revoke the
//! decision.
//!
//! All per-session state lives in one arena map owned by the gate: a rate
//! window, a short identical-payload guard, and the set of payloads whose
//! admission decision is still in flight. The coordinator tears an entry
//! down when its session ends.

mod dedup;
mod rate;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tagdesk_common::config::AdmissionConfig;
use tagdesk_common::Persistence;
use tracing::{debug, warn};
use uuid::Uuid;

use dedup::DedupCache;
use rate::RateWindow;

/// Outcome of one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Proceed to decode and persist
    Admitted,
    /// Identical payload seen within the short guard window
    RejectedDuplicate {
        /// Elapsed time since the previous sighting
        within: Duration,
    },
    /// Session exceeded its rolling admission cap
    RejectedRateLimited,
    /// Payload already durably recorded earlier today
    RejectedDuplicateToday,
}

/// Admission limits, derived from [`AdmissionConfig`].
#[derive(Debug, Clone)]
pub struct GateLimits {
    /// Maximum admissions per session within `rate_window`
    pub rate_cap: usize,
    /// Rolling window the cap applies to
    pub rate_window: Duration,
    /// Identical-payload guard window
    pub duplicate_guard: Duration,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            rate_cap: 20,
            rate_window: Duration::from_secs(60),
            duplicate_guard: Duration::from_secs(3),
        }
    }
}

impl From<&AdmissionConfig> for GateLimits {
    fn from(config: &AdmissionConfig) -> Self {
        Self {
            rate_cap: config.rate_cap as usize,
            rate_window: config.rate_window(),
            duplicate_guard: config.duplicate_guard(),
        }
    }
}

/// Admission state bundle for one session.
#[derive(Debug, Default)]
struct AdmissionState {
    rate: RateWindow,
    dedup: DedupCache,
    pending: HashSet<String>,
}

/// The admission gate. One instance per station process; safe to call from
/// concurrent tasks.
pub struct ScanAdmissionGate {
    limits: GateLimits,
    persistence: Arc<dyn Persistence>,
    sessions: Mutex<HashMap<Uuid, AdmissionState>>,
}

impl ScanAdmissionGate {
    pub fn new(persistence: Arc<dyn Persistence>, limits: GateLimits) -> Self {
        Self {
            limits,
            persistence,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, AdmissionState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether one scan may proceed.
    ///
    /// Decision order: identical-payload guard, rate cap, durable same-day
    /// lookup, admit. The in-memory checks and the pending mark are one
    /// critical section, so two near-simultaneous identical scans on the
    /// same session cannot both be admitted while the durable lookup is in
    /// flight.
    pub async fn admit(&self, session_id: Uuid, payload: &str, now: Instant) -> Admission {
        {
            let mut sessions = self.sessions();
            let state = sessions.entry(session_id).or_default();

            if state.pending.contains(payload) {
                debug!(%session_id, "identical scan already in flight");
                return Admission::RejectedDuplicate {
                    within: Duration::ZERO,
                };
            }

            if let Some(elapsed) =
                state
                    .dedup
                    .recent_sighting(payload, now, self.limits.duplicate_guard)
            {
                // Refresh the sighting: hammering the same code keeps it guarded
                state.dedup.record(payload, now);
                return Admission::RejectedDuplicate { within: elapsed };
            }

            if state.rate.admitted_within(now, self.limits.rate_window) >= self.limits.rate_cap {
                debug!(%session_id, "rate cap reached");
                return Admission::RejectedRateLimited;
            }

            state.pending.insert(payload.to_string());
        }

        // Durable lookup happens outside the lock; the pending mark above
        // keeps identical concurrent attempts out in the meantime.
        let durable_duplicate = match self.persistence.has_duplicate_today(payload).await {
            Ok(duplicate) => duplicate,
            Err(e) => {
                warn!(error = %e, "duplicate lookup failed, treating payload as new");
                false
            }
        };

        let mut sessions = self.sessions();
        let state = sessions.entry(session_id).or_default();
        state.pending.remove(payload);

        if durable_duplicate {
            return Admission::RejectedDuplicateToday;
        }

        // Re-check the cap: other payloads may have consumed the remaining
        // slots while the lookup was in flight. A rejection consumes none.
        if state.rate.admitted_within(now, self.limits.rate_window) >= self.limits.rate_cap {
            return Admission::RejectedRateLimited;
        }

        state.rate.record(now);
        state.dedup.record(payload, now);
        state.dedup.prune(now, self.limits.duplicate_guard);
        Admission::Admitted
    }

    /// Drop all admission state for a session (called when it ends, and for
    /// a freshly created session id).
    pub fn clear_session(&self, session_id: Uuid) {
        if self.sessions().remove(&session_id).is_some() {
            debug!(%session_id, "cleared admission state");
        }
    }
}

impl std::fmt::Debug for ScanAdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanAdmissionGate")
            .field("limits", &self.limits)
            .field("tracked_sessions", &self.sessions().len())
            .finish()
    }
}
