//! The session-switch coordinator
//!
//! Owns the single "current session" slot and runs the ordered protocol a
//! tag presentation triggers: reset notification, end every active session,
//! logout notifications, create the replacement, login notification. The
//! whole protocol runs under one lock, settle delays included, so switches
//! execute to completion one at a time in arrival order and their
//! notification sequences never interleave. Once a switch has started ending
//! sessions it runs to completion; the cooldown rejection is the only
//! before-start bailout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tagdesk_common::config::SwitchConfig;
use tagdesk_common::db::models::{Identity, Session};
use tagdesk_common::events::{EventBus, LogoutReason, StationEvent};
use tagdesk_common::Persistence;

use crate::gate::ScanAdmissionGate;

/// Timing contract of the switch protocol.
///
/// The settle delays are not tuning: downstream consumers rely on observing
/// the reset before the logouts and the logouts before the login.
#[derive(Debug, Clone)]
pub struct SwitchTiming {
    /// Ignore repeated tag presentations within this window (reader debounce)
    pub cooldown: Duration,
    /// Pause after the reset notification
    pub reset_settle: Duration,
    /// Pause after the logout notifications, when any session was ended
    pub logout_settle: Duration,
}

impl Default for SwitchTiming {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            reset_settle: Duration::from_millis(100),
            logout_settle: Duration::from_millis(200),
        }
    }
}

impl From<&SwitchConfig> for SwitchTiming {
    fn from(config: &SwitchConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            reset_settle: config.reset_settle(),
            logout_settle: config.logout_settle(),
        }
    }
}

/// The current session together with its resolved identity.
#[derive(Debug, Clone)]
struct ActiveSession {
    session: Session,
    identity: Identity,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    current: Option<ActiveSession>,
    last_presented_at: Option<Instant>,
}

/// Owns the station's current session.
pub struct SessionSwitchCoordinator {
    persistence: Arc<dyn Persistence>,
    events: EventBus,
    gate: Arc<ScanAdmissionGate>,
    timing: SwitchTiming,
    // One mutation in flight at a time: the protocol spans multiple awaited
    // steps and a second presentation must queue behind it, not interleave.
    state: Mutex<CoordinatorState>,
}

impl SessionSwitchCoordinator {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        events: EventBus,
        gate: Arc<ScanAdmissionGate>,
        timing: SwitchTiming,
    ) -> Self {
        Self {
            persistence,
            events,
            gate,
            timing,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// The session currently installed at this station, if any.
    pub async fn current_session(&self) -> Option<Session> {
        self.state
            .lock()
            .await
            .current
            .as_ref()
            .map(|active| active.session.clone())
    }

    /// An identity tag was presented at the reader.
    pub async fn on_identity_presented(&self, tag_id: &str) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        if let Some(last) = state.last_presented_at {
            if now.duration_since(last) < self.timing.cooldown {
                debug!(tag_id, "tag presentation ignored (cooldown)");
                return;
            }
        }
        state.last_presented_at = Some(now);

        let identity = match self.persistence.find_identity_by_tag(tag_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                warn!(tag_id, "unknown tag");
                self.events
                    .emit(StationEvent::scan_error(tag_id, "unknown tag"))
                    .ok();
                return;
            }
            Err(e) => {
                error!(tag_id, error = %e, "identity lookup failed");
                self.events
                    .emit(StationEvent::system_error(format!(
                        "identity lookup failed: {e}"
                    )))
                    .ok();
                return;
            }
        };

        info!(tag_id, worker = %identity.display_name, "identity presented, starting switch");

        // Consumers must observe the reset before any logout/login lands
        self.events
            .emit(StationEvent::SessionResetRequested {
                identity: identity.clone(),
                timestamp: chrono::Utc::now(),
            })
            .ok();
        sleep(self.timing.reset_settle).await;

        // End every active session in the store, not just the local one: a
        // stale session from a crashed run must not survive the switch.
        let ended = match self.persistence.end_all_active_sessions().await {
            Ok(ended) => ended,
            Err(e) => {
                error!(error = %e, "failed to end active sessions");
                self.events
                    .emit(StationEvent::system_error(format!(
                        "failed to end active sessions: {e}"
                    )))
                    .ok();
                return;
            }
        };

        // Whatever the local slot held was ended (or never existed)
        state.current = None;

        for ended_session in &ended {
            self.gate.clear_session(ended_session.session_id);
            self.events
                .emit(StationEvent::UserLoggedOut {
                    identity_id: ended_session.identity_id,
                    identity_name: ended_session.identity_name.clone(),
                    session_id: ended_session.session_id,
                    reason: LogoutReason::AutomaticSwitch,
                    timestamp: chrono::Utc::now(),
                })
                .ok();
        }
        if !ended.is_empty() {
            sleep(self.timing.logout_settle).await;
        }

        let session = match self.persistence.create_session(identity.id).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "session creation failed");
                self.events
                    .emit(StationEvent::scan_error(tag_id, "session creation failed"))
                    .ok();
                self.events
                    .emit(StationEvent::system_error(format!(
                        "session creation failed: {e}"
                    )))
                    .ok();
                return;
            }
        };

        self.gate.clear_session(session.session_id);
        state.current = Some(ActiveSession {
            session: session.clone(),
            identity: identity.clone(),
        });

        info!(
            worker = %identity.display_name,
            session = %session.session_id,
            ended = ended.len(),
            "worker logged in"
        );
        self.events
            .emit(StationEvent::UserLoggedIn {
                identity,
                session,
                ended_count: ended.len(),
                full_reset: true,
                timestamp: chrono::Utc::now(),
            })
            .ok();
    }

    /// Explicit logout request. Idempotent: a stale session id is a no-op.
    pub async fn on_manual_logout(&self, session_id: Uuid) {
        let mut state = self.state.lock().await;

        let identity = match &state.current {
            Some(active) if active.session.session_id == session_id => active.identity.clone(),
            _ => {
                debug!(%session_id, "logout for a superseded session ignored");
                return;
            }
        };

        match self.persistence.end_session(session_id).await {
            Ok(ended) => {
                if !ended {
                    debug!(%session_id, "session was already ended in the store");
                }
                state.current = None;
                self.gate.clear_session(session_id);
                info!(worker = %identity.display_name, %session_id, "manual logout");
                self.events
                    .emit(StationEvent::UserLoggedOut {
                        identity_id: identity.id,
                        identity_name: identity.display_name,
                        session_id,
                        reason: LogoutReason::Manual,
                        timestamp: chrono::Utc::now(),
                    })
                    .ok();
            }
            Err(e) => {
                error!(%session_id, error = %e, "failed to end session");
                self.events
                    .emit(StationEvent::system_error(format!(
                        "failed to end session: {e}"
                    )))
                    .ok();
            }
        }
    }

    /// Non-reader login path: replaces any session of the same identity but
    /// leaves other workers' sessions alone.
    pub async fn on_manual_login(&self, identity_id: Uuid) {
        let mut state = self.state.lock().await;

        let identity = match self.persistence.find_identity(identity_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                warn!(%identity_id, "manual login for unknown identity");
                self.events
                    .emit(StationEvent::scan_error(
                        identity_id.to_string(),
                        "unknown identity",
                    ))
                    .ok();
                return;
            }
            Err(e) => {
                error!(%identity_id, error = %e, "identity lookup failed");
                self.events
                    .emit(StationEvent::system_error(format!(
                        "identity lookup failed: {e}"
                    )))
                    .ok();
                return;
            }
        };

        let ended = match self
            .persistence
            .end_active_sessions_for_identity(identity_id)
            .await
        {
            Ok(ended) => ended,
            Err(e) => {
                error!(%identity_id, error = %e, "failed to end sessions for identity");
                self.events
                    .emit(StationEvent::system_error(format!(
                        "failed to end sessions for identity: {e}"
                    )))
                    .ok();
                return;
            }
        };

        for ended_session in &ended {
            self.gate.clear_session(ended_session.session_id);
            if state
                .current
                .as_ref()
                .is_some_and(|active| active.session.session_id == ended_session.session_id)
            {
                state.current = None;
            }
            self.events
                .emit(StationEvent::UserLoggedOut {
                    identity_id: ended_session.identity_id,
                    identity_name: ended_session.identity_name.clone(),
                    session_id: ended_session.session_id,
                    reason: LogoutReason::AutomaticSwitch,
                    timestamp: chrono::Utc::now(),
                })
                .ok();
        }

        let session = match self.persistence.create_session(identity.id).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "session creation failed");
                self.events
                    .emit(StationEvent::scan_error(
                        identity_id.to_string(),
                        "session creation failed",
                    ))
                    .ok();
                self.events
                    .emit(StationEvent::system_error(format!(
                        "session creation failed: {e}"
                    )))
                    .ok();
                return;
            }
        };

        self.gate.clear_session(session.session_id);
        state.current = Some(ActiveSession {
            session: session.clone(),
            identity: identity.clone(),
        });

        info!(worker = %identity.display_name, session = %session.session_id, "manual login");
        self.events
            .emit(StationEvent::UserLoggedIn {
                identity,
                session,
                ended_count: ended.len(),
                full_reset: false,
                timestamp: chrono::Utc::now(),
            })
            .ok();
    }

    /// End the current session because the station is going down.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;

        let Some(active) = state.current.take() else {
            debug!("shutdown with no current session");
            return;
        };
        let session_id = active.session.session_id;
        self.gate.clear_session(session_id);

        match self.persistence.end_session(session_id).await {
            Ok(_) => {
                info!(worker = %active.identity.display_name, %session_id, "session ended on shutdown");
                self.events
                    .emit(StationEvent::UserLoggedOut {
                        identity_id: active.identity.id,
                        identity_name: active.identity.display_name,
                        session_id,
                        reason: LogoutReason::Shutdown,
                        timestamp: chrono::Utc::now(),
                    })
                    .ok();
            }
            Err(e) => {
                error!(%session_id, error = %e, "failed to end session on shutdown");
                self.events
                    .emit(StationEvent::system_error(format!(
                        "failed to end session on shutdown: {e}"
                    )))
                    .ok();
            }
        }
    }
}
