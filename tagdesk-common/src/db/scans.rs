//! Scan record database access

use crate::db::models::{DecodedPayload, PayloadFormat, ScanRecord};
use crate::error::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Durably record one admitted scan with its decoded fields.
pub async fn record_scan(
    db: &SqlitePool,
    session_id: Uuid,
    payload: &str,
    decoded: &DecodedPayload,
) -> Result<ScanRecord> {
    let scan_id = Uuid::new_v4();
    let scanned_at = chrono::Utc::now();

    sqlx::query(
        r#"
        INSERT INTO scans
            (scan_id, session_id, payload, order_ref, package_ref, customer_ref, format, scanned_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scan_id.to_string())
    .bind(session_id.to_string())
    .bind(payload)
    .bind(&decoded.order_ref)
    .bind(&decoded.package_ref)
    .bind(&decoded.customer_ref)
    .bind(decoded.format.as_str())
    .bind(scanned_at)
    .execute(db)
    .await?;

    Ok(ScanRecord {
        scan_id,
        session_id,
        payload: payload.to_string(),
        decoded: decoded.clone(),
        scanned_at,
    })
}

/// Has this payload already been durably recorded today (UTC calendar day)?
pub async fn has_duplicate_today(db: &SqlitePool, payload: &str) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM scans WHERE payload = ? AND date(scanned_at) = date('now')",
    )
    .bind(payload)
    .fetch_one(db)
    .await?;

    Ok(count > 0)
}

/// Load one scan back, decoded fields included.
pub async fn find_scan(db: &SqlitePool, scan_id: Uuid) -> Result<Option<ScanRecord>> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            chrono::DateTime<chrono::Utc>,
        ),
    >(
        r#"
        SELECT scan_id, session_id, payload, order_ref, package_ref, customer_ref, format, scanned_at
        FROM scans WHERE scan_id = ?
        "#,
    )
    .bind(scan_id.to_string())
    .fetch_optional(db)
    .await?;

    let Some((scan_id, session_id, payload, order_ref, package_ref, customer_ref, format, scanned_at)) =
        row
    else {
        return Ok(None);
    };

    let parse = |s: &str| {
        Uuid::parse_str(s).map_err(|e| Error::Internal(format!("invalid uuid in database: {e}")))
    };

    Ok(Some(ScanRecord {
        scan_id: parse(&scan_id)?,
        session_id: parse(&session_id)?,
        decoded: DecodedPayload {
            order_ref,
            package_ref,
            customer_ref,
            format: PayloadFormat::from_db(&format),
            raw: payload.clone(),
        },
        payload,
        scanned_at,
    }))
}

/// Number of scans recorded for a session.
pub async fn count_scans_for_session(db: &SqlitePool, session_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM scans WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(db)
        .await?;
    Ok(count)
}
