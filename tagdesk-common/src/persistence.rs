//! The persistence collaborator boundary
//!
//! The station core talks to durable storage only through the [`Persistence`]
//! trait, decoupling the coordinator and admission gate from the concrete
//! store. [`SqlitePersistence`] is the shipped implementation; tests swap in
//! scripted fakes to exercise failure paths.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::db::models::{DecodedPayload, EndedSession, Identity, ScanRecord, Session};
use crate::error::Result;

/// Abstract durable storage consumed by the station core.
///
/// Semantics the store must uphold:
/// - `end_all_active_sessions` is atomic from the store's perspective (no
///   fetch-then-update window in which another process sees a session as
///   still active).
/// - `has_duplicate_today` considers durably recorded scans of the current
///   calendar day only.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Resolve a scanned tag to a worker identity.
    async fn find_identity_by_tag(&self, tag_id: &str) -> Result<Option<Identity>>;

    /// Look up a worker identity by id.
    async fn find_identity(&self, identity_id: Uuid) -> Result<Option<Identity>>;

    /// Create a new active session for an identity.
    async fn create_session(&self, identity_id: Uuid) -> Result<Session>;

    /// End one session; returns whether a still-active session was ended.
    async fn end_session(&self, session_id: Uuid) -> Result<bool>;

    /// End every currently-active session and report what was ended.
    async fn end_all_active_sessions(&self) -> Result<Vec<EndedSession>>;

    /// End the active sessions belonging to one identity.
    async fn end_active_sessions_for_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<EndedSession>>;

    /// Has this payload already been durably recorded today?
    async fn has_duplicate_today(&self, payload: &str) -> Result<bool>;

    /// Durably record one admitted scan.
    async fn record_scan(
        &self,
        session_id: Uuid,
        payload: &str,
        decoded: &DecodedPayload,
    ) -> Result<ScanRecord>;
}

/// SQLite-backed [`Persistence`] over the `db::` query modules.
#[derive(Clone)]
pub struct SqlitePersistence {
    db: SqlitePool,
}

impl SqlitePersistence {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Access the underlying pool (host-side provisioning, tests).
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn find_identity_by_tag(&self, tag_id: &str) -> Result<Option<Identity>> {
        db::sessions::find_identity_by_tag(&self.db, tag_id).await
    }

    async fn find_identity(&self, identity_id: Uuid) -> Result<Option<Identity>> {
        db::sessions::find_identity(&self.db, identity_id).await
    }

    async fn create_session(&self, identity_id: Uuid) -> Result<Session> {
        db::sessions::create_session(&self.db, identity_id).await
    }

    async fn end_session(&self, session_id: Uuid) -> Result<bool> {
        db::sessions::end_session(&self.db, session_id).await
    }

    async fn end_all_active_sessions(&self) -> Result<Vec<EndedSession>> {
        db::sessions::end_all_active_sessions(&self.db).await
    }

    async fn end_active_sessions_for_identity(
        &self,
        identity_id: Uuid,
    ) -> Result<Vec<EndedSession>> {
        db::sessions::end_active_sessions_for_identity(&self.db, identity_id).await
    }

    async fn has_duplicate_today(&self, payload: &str) -> Result<bool> {
        db::scans::has_duplicate_today(&self.db, payload).await
    }

    async fn record_scan(
        &self,
        session_id: Uuid,
        payload: &str,
        decoded: &DecodedPayload,
    ) -> Result<ScanRecord> {
        db::scans::record_scan(&self.db, session_id, payload, decoded).await
    }
}
