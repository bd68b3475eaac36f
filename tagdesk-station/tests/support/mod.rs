//! Shared test support: in-memory persistence with scriptable failures, a
//! scripted wrapper over the real SQLite persistence, and event helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use tagdesk_common::db::models::{
    DecodedPayload, EndedSession, Identity, ScanRecord, Session,
};
use tagdesk_common::error::{Error, Result};
use tagdesk_common::events::StationEvent;
use tagdesk_common::{Persistence, SqlitePersistence, StationConfig};
use tagdesk_station::Station;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Collect every event the station has emitted so far.
pub fn drain(rx: &mut broadcast::Receiver<StationEvent>) -> Vec<StationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Event kind names for order assertions.
pub fn kinds(events: &[StationEvent]) -> Vec<&'static str> {
    events.iter().map(kind).collect()
}

pub fn kind(event: &StationEvent) -> &'static str {
    match event {
        StationEvent::SessionResetRequested { .. } => "SessionResetRequested",
        StationEvent::UserLoggedIn { .. } => "UserLoggedIn",
        StationEvent::UserLoggedOut { .. } => "UserLoggedOut",
        StationEvent::ScanError { .. } => "ScanError",
        StationEvent::ScanAdmitted { .. } => "ScanAdmitted",
        StationEvent::ScanRejected { .. } => "ScanRejected",
        StationEvent::SystemError { .. } => "SystemError",
    }
}

// ========================================
// In-memory persistence (switch-protocol tests)
// ========================================

#[derive(Default)]
struct MemoryState {
    identities: Vec<(String, Identity)>,
    sessions: Vec<Session>,
    scans: Vec<ScanRecord>,
}

/// Pure in-memory [`Persistence`] with toggleable failure points, for tests
/// that need deterministic paused-clock timing without database I/O.
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<MemoryState>,
    pub fail_lookup: AtomicBool,
    pub fail_create_session: AtomicBool,
    pub fail_end_session: AtomicBool,
    pub fail_end_all: AtomicBool,
    pub fail_record_scan: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scripted(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::Internal(format!("scripted failure: {what}")))
        } else {
            Ok(())
        }
    }

    pub fn add_worker(&self, tag_id: &str, display_name: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
        };
        self.state()
            .identities
            .push((tag_id.to_string(), identity.clone()));
        identity
    }

    /// Plant an active session directly, as a crashed previous run would
    /// have left behind.
    pub fn plant_active_session(&self, identity_id: Uuid) -> Session {
        let session = Session {
            session_id: Uuid::new_v4(),
            identity_id,
            started_at: chrono::Utc::now(),
            active: true,
        };
        self.state().sessions.push(session.clone());
        session
    }

    pub fn active_count(&self) -> usize {
        self.state().sessions.iter().filter(|s| s.active).count()
    }

    pub fn scan_count(&self) -> usize {
        self.state().scans.len()
    }

    fn display_name(state: &MemoryState, identity_id: Uuid) -> String {
        state
            .identities
            .iter()
            .find(|(_, i)| i.id == identity_id)
            .map(|(_, i)| i.display_name.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn find_identity_by_tag(&self, tag_id: &str) -> Result<Option<Identity>> {
        Self::scripted(&self.fail_lookup, "find_identity_by_tag")?;
        Ok(self
            .state()
            .identities
            .iter()
            .find(|(tag, _)| tag == tag_id)
            .map(|(_, identity)| identity.clone()))
    }

    async fn find_identity(&self, identity_id: Uuid) -> Result<Option<Identity>> {
        Self::scripted(&self.fail_lookup, "find_identity")?;
        Ok(self
            .state()
            .identities
            .iter()
            .find(|(_, i)| i.id == identity_id)
            .map(|(_, identity)| identity.clone()))
    }

    async fn create_session(&self, identity_id: Uuid) -> Result<Session> {
        Self::scripted(&self.fail_create_session, "create_session")?;
        Ok(self.plant_active_session(identity_id))
    }

    async fn end_session(&self, session_id: Uuid) -> Result<bool> {
        Self::scripted(&self.fail_end_session, "end_session")?;
        let mut state = self.state();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id && s.active);
        match session {
            Some(session) => {
                session.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn end_all_active_sessions(&self) -> Result<Vec<EndedSession>> {
        Self::scripted(&self.fail_end_all, "end_all_active_sessions")?;
        let mut state = self.state();
        let ended: Vec<EndedSession> = state
            .sessions
            .iter()
            .filter(|s| s.active)
            .map(|s| EndedSession {
                session_id: s.session_id,
                identity_id: s.identity_id,
                identity_name: Self::display_name(&state, s.identity_id),
            })
            .collect();
        for session in state.sessions.iter_mut() {
            session.active = false;
        }
        Ok(ended)
    }

    async fn end_active_sessions_for_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<EndedSession>> {
        Self::scripted(&self.fail_end_all, "end_active_sessions_for_identity")?;
        let mut state = self.state();
        let identity_name = Self::display_name(&state, identity_id);
        let mut ended = Vec::new();
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.active && s.identity_id == identity_id)
        {
            session.active = false;
            ended.push(EndedSession {
                session_id: session.session_id,
                identity_id,
                identity_name: identity_name.clone(),
            });
        }
        Ok(ended)
    }

    async fn has_duplicate_today(&self, payload: &str) -> Result<bool> {
        Ok(self.state().scans.iter().any(|scan| scan.payload == payload))
    }

    async fn record_scan(
        &self,
        session_id: Uuid,
        payload: &str,
        decoded: &DecodedPayload,
    ) -> Result<ScanRecord> {
        Self::scripted(&self.fail_record_scan, "record_scan")?;
        let record = ScanRecord {
            scan_id: Uuid::new_v4(),
            session_id,
            payload: payload.to_string(),
            decoded: decoded.clone(),
            scanned_at: chrono::Utc::now(),
        };
        self.state().scans.push(record.clone());
        Ok(record)
    }
}

// ========================================
// Scripted wrapper over SQLite (pipeline tests)
// ========================================

/// Real SQLite persistence with toggleable failure points layered on top.
pub struct ScriptedPersistence {
    inner: SqlitePersistence,
    pub fail_record_scan: AtomicBool,
}

impl ScriptedPersistence {
    pub fn new(inner: SqlitePersistence) -> Self {
        Self {
            inner,
            fail_record_scan: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqlitePersistence {
        &self.inner
    }
}

#[async_trait]
impl Persistence for ScriptedPersistence {
    async fn find_identity_by_tag(&self, tag_id: &str) -> Result<Option<Identity>> {
        self.inner.find_identity_by_tag(tag_id).await
    }

    async fn find_identity(&self, identity_id: Uuid) -> Result<Option<Identity>> {
        self.inner.find_identity(identity_id).await
    }

    async fn create_session(&self, identity_id: Uuid) -> Result<Session> {
        self.inner.create_session(identity_id).await
    }

    async fn end_session(&self, session_id: Uuid) -> Result<bool> {
        self.inner.end_session(session_id).await
    }

    async fn end_all_active_sessions(&self) -> Result<Vec<EndedSession>> {
        self.inner.end_all_active_sessions().await
    }

    async fn end_active_sessions_for_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<EndedSession>> {
        self.inner.end_active_sessions_for_identity(identity_id).await
    }

    async fn has_duplicate_today(&self, payload: &str) -> Result<bool> {
        self.inner.has_duplicate_today(payload).await
    }

    async fn record_scan(
        &self,
        session_id: Uuid,
        payload: &str,
        decoded: &DecodedPayload,
    ) -> Result<ScanRecord> {
        if self.fail_record_scan.load(Ordering::SeqCst) {
            return Err(Error::Internal("scripted failure: record_scan".into()));
        }
        self.inner.record_scan(session_id, payload, decoded).await
    }
}

// ========================================
// Station rigs
// ========================================

pub struct MemoryRig {
    pub station: Station,
    pub persistence: Arc<MemoryPersistence>,
}

/// Station over in-memory persistence with default timing.
pub fn memory_station(workers: &[(&str, &str)]) -> (MemoryRig, Vec<Identity>) {
    memory_station_with(workers, StationConfig::default())
}

pub fn memory_station_with(
    workers: &[(&str, &str)],
    config: StationConfig,
) -> (MemoryRig, Vec<Identity>) {
    let persistence = Arc::new(MemoryPersistence::new());
    let identities = workers
        .iter()
        .map(|(tag, name)| persistence.add_worker(tag, name))
        .collect();
    let shared: Arc<dyn Persistence> = persistence.clone();
    let station = Station::new(shared, &config);
    (
        MemoryRig {
            station,
            persistence,
        },
        identities,
    )
}

/// Station over a fresh in-memory SQLite database, cooldown disabled so
/// pipeline tests can log workers in back to back.
pub async fn sqlite_station(workers: &[(&str, &str)]) -> (Station, Arc<ScriptedPersistence>, Vec<Identity>) {
    let pool = tagdesk_common::db::init_memory_database().await.unwrap();
    let mut identities = Vec::new();
    for (tag, name) in workers {
        identities.push(
            tagdesk_common::db::sessions::create_identity(&pool, tag, name)
                .await
                .unwrap(),
        );
    }

    let persistence = Arc::new(ScriptedPersistence::new(SqlitePersistence::new(pool)));
    let shared: Arc<dyn Persistence> = persistence.clone();

    let mut config = StationConfig::default();
    config.switch.cooldown_ms = 0;
    let station = Station::new(shared, &config);

    (station, persistence, identities)
}
