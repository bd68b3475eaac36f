//! Identity and session database access

use crate::db::models::{EndedSession, Identity, Session};
use crate::error::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("invalid uuid in database: {e}")))
}

/// Provision a worker identity for a tag. Host/test concern, not part of the
/// station's own runtime flow.
pub async fn create_identity(db: &SqlitePool, tag_id: &str, display_name: &str) -> Result<Identity> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO identities (id, tag_id, display_name) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(tag_id)
        .bind(display_name)
        .execute(db)
        .await?;

    Ok(Identity {
        id,
        display_name: display_name.to_string(),
    })
}

/// Resolve a scanned tag to a worker identity.
pub async fn find_identity_by_tag(db: &SqlitePool, tag_id: &str) -> Result<Option<Identity>> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT id, display_name FROM identities WHERE tag_id = ?",
    )
    .bind(tag_id)
    .fetch_optional(db)
    .await?;

    match row {
        Some((id, display_name)) => Ok(Some(Identity {
            id: parse_uuid(&id)?,
            display_name,
        })),
        None => Ok(None),
    }
}

/// Look up a worker identity by id.
pub async fn find_identity(db: &SqlitePool, identity_id: Uuid) -> Result<Option<Identity>> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT id, display_name FROM identities WHERE id = ?",
    )
    .bind(identity_id.to_string())
    .fetch_optional(db)
    .await?;

    match row {
        Some((id, display_name)) => Ok(Some(Identity {
            id: parse_uuid(&id)?,
            display_name,
        })),
        None => Ok(None),
    }
}

/// Create a new active session for an identity.
pub async fn create_session(db: &SqlitePool, identity_id: Uuid) -> Result<Session> {
    let session = Session {
        session_id: Uuid::new_v4(),
        identity_id,
        started_at: chrono::Utc::now(),
        active: true,
    };

    sqlx::query(
        "INSERT INTO sessions (session_id, identity_id, started_at, active) VALUES (?, ?, ?, 1)",
    )
    .bind(session.session_id.to_string())
    .bind(session.identity_id.to_string())
    .bind(session.started_at)
    .execute(db)
    .await?;

    Ok(session)
}

/// End one session. Returns whether a still-active session was actually ended.
pub async fn end_session(db: &SqlitePool, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE sessions SET active = 0 WHERE session_id = ? AND active = 1")
        .bind(session_id.to_string())
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// End every currently-active session, whoever owns it.
///
/// A single UPDATE statement, so two station processes racing here cannot
/// both observe the same session as still active.
pub async fn end_all_active_sessions(db: &SqlitePool) -> Result<Vec<EndedSession>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "UPDATE sessions SET active = 0 WHERE active = 1 RETURNING session_id, identity_id",
    )
    .fetch_all(db)
    .await?;

    with_identity_names(db, rows).await
}

/// End the active sessions belonging to one identity.
pub async fn end_active_sessions_for_identity(
    db: &SqlitePool,
    identity_id: Uuid,
) -> Result<Vec<EndedSession>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "UPDATE sessions SET active = 0 WHERE active = 1 AND identity_id = ? \
         RETURNING session_id, identity_id",
    )
    .bind(identity_id.to_string())
    .fetch_all(db)
    .await?;

    with_identity_names(db, rows).await
}

/// Number of sessions currently marked active.
pub async fn count_active_sessions(db: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE active = 1")
        .fetch_one(db)
        .await?;
    Ok(count)
}

async fn with_identity_names(
    db: &SqlitePool,
    rows: Vec<(String, String)>,
) -> Result<Vec<EndedSession>> {
    let mut ended = Vec::with_capacity(rows.len());
    for (session_id, identity_id) in rows {
        let identity_name =
            sqlx::query_scalar::<_, String>("SELECT display_name FROM identities WHERE id = ?")
                .bind(&identity_id)
                .fetch_optional(db)
                .await?
                .unwrap_or_default();

        ended.push(EndedSession {
            session_id: parse_uuid(&session_id)?,
            identity_id: parse_uuid(&identity_id)?,
            identity_name,
        });
    }
    Ok(ended)
}
