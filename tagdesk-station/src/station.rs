//! Station facade
//!
//! Wires the coordinator, admission gate, and decoder to the persistence
//! collaborator and the event bus, and exposes the event intake the host
//! drivers (identity reader, scanner capture loop, UI) call into.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use uuid::Uuid;

use tagdesk_common::db::models::Session;
use tagdesk_common::events::{EventBus, RejectReason, StationEvent};
use tagdesk_common::{Persistence, StationConfig};

use crate::decode::decode;
use crate::gate::{Admission, GateLimits, ScanAdmissionGate};
use crate::session::{SessionSwitchCoordinator, SwitchTiming};

/// The assembled station core.
pub struct Station {
    persistence: Arc<dyn Persistence>,
    events: EventBus,
    gate: Arc<ScanAdmissionGate>,
    coordinator: SessionSwitchCoordinator,
}

impl Station {
    pub fn new(persistence: Arc<dyn Persistence>, config: &StationConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let gate = Arc::new(ScanAdmissionGate::new(
            Arc::clone(&persistence),
            GateLimits::from(&config.admission),
        ));
        let coordinator = SessionSwitchCoordinator::new(
            Arc::clone(&persistence),
            events.clone(),
            Arc::clone(&gate),
            SwitchTiming::from(&config.switch),
        );

        Self {
            persistence,
            events,
            gate,
            coordinator,
        }
    }

    /// The station's notification bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to station notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.events.subscribe()
    }

    /// The session currently installed, if any.
    pub async fn current_session(&self) -> Option<Session> {
        self.coordinator.current_session().await
    }

    /// Identity-reader driver intake.
    pub async fn on_identity_presented(&self, tag_id: &str) {
        self.coordinator.on_identity_presented(tag_id).await;
    }

    /// Explicit logout intake.
    pub async fn on_manual_logout(&self, session_id: Uuid) {
        self.coordinator.on_manual_logout(session_id).await;
    }

    /// Non-reader login intake.
    pub async fn on_manual_login(&self, identity_id: Uuid) {
        self.coordinator.on_manual_login(identity_id).await;
    }

    /// End the current session before the process goes down.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }

    /// Scanner capture-loop intake: one raw scanned string for a session.
    ///
    /// Rejections and errors are notifications, not return values; the
    /// capture loop fires and forgets.
    pub async fn on_raw_scan(&self, session_id: Uuid, payload: &str) {
        match self.current_session().await {
            Some(current) if current.session_id == session_id => {}
            _ => {
                warn!(%session_id, "scan for a session that is not current");
                self.events
                    .emit(StationEvent::scan_error(payload, "no active session for scan"))
                    .ok();
                return;
            }
        }

        match self.gate.admit(session_id, payload, Instant::now()).await {
            Admission::Admitted => {
                let decoded = decode(payload);
                match self
                    .persistence
                    .record_scan(session_id, payload, &decoded)
                    .await
                {
                    Ok(record) => {
                        debug!(%session_id, format = ?record.decoded.format, "scan recorded");
                        self.events
                            .emit(StationEvent::ScanAdmitted {
                                session_id,
                                decoded: record.decoded,
                                timestamp: chrono::Utc::now(),
                            })
                            .ok();
                    }
                    Err(e) => {
                        // The admission decision stands; only the recording failed
                        error!(%session_id, error = %e, "failed to record scan");
                        self.events
                            .emit(StationEvent::system_error(format!(
                                "failed to record scan: {e}"
                            )))
                            .ok();
                    }
                }
            }
            Admission::RejectedDuplicate { within } => {
                self.reject(session_id, payload, RejectReason::Duplicate {
                    within_ms: within.as_millis() as u64,
                });
            }
            Admission::RejectedRateLimited => {
                self.reject(session_id, payload, RejectReason::RateLimited);
            }
            Admission::RejectedDuplicateToday => {
                self.reject(session_id, payload, RejectReason::DuplicateToday);
            }
        }
    }

    fn reject(&self, session_id: Uuid, payload: &str, reason: RejectReason) {
        debug!(%session_id, ?reason, "scan rejected");
        self.events
            .emit(StationEvent::ScanRejected {
                session_id,
                payload: payload.to_string(),
                reason,
                timestamp: chrono::Utc::now(),
            })
            .ok();
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("gate", &self.gate)
            .finish()
    }
}
