//! Database models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External worker record, resolved from a scanned identity tag.
///
/// Immutable from the station core's perspective; provisioning workers is the
/// host's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub display_name: String,
}

/// One worker's active presence at the station.
///
/// At most one session is `active` process-wide at any instant; the
/// coordinator owns that invariant, the database owns history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub identity_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub active: bool,
}

/// Result row of an "end all active sessions" sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndedSession {
    pub session_id: Uuid,
    pub identity_id: Uuid,
    pub identity_name: String,
}

/// Durable record of one admitted scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: Uuid,
    pub session_id: Uuid,
    pub payload: String,
    pub decoded: DecodedPayload,
    pub scanned_at: chrono::DateTime<chrono::Utc>,
}

/// Which decode rule claimed the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// Caret-delimited frame with positional fields
    CaretSeparated,
    /// Free text, fields extracted by pattern matching
    PatternMatching,
    /// Free text, nothing extracted
    Text,
    /// Empty or unusable input
    Unknown,
}

impl PayloadFormat {
    /// Stable string form used in the `scans.format` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::CaretSeparated => "caret_separated",
            PayloadFormat::PatternMatching => "pattern_matching",
            PayloadFormat::Text => "text",
            PayloadFormat::Unknown => "unknown",
        }
    }

    /// Parse the column form back; unknown strings map to `Unknown`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "caret_separated" => PayloadFormat::CaretSeparated,
            "pattern_matching" => PayloadFormat::PatternMatching,
            "text" => PayloadFormat::Text,
            _ => PayloadFormat::Unknown,
        }
    }
}

/// Structured fields extracted from a raw scanned payload.
///
/// Produced once per payload by the decoder and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub order_ref: Option<String>,
    pub package_ref: Option<String>,
    pub customer_ref: Option<String>,
    pub format: PayloadFormat,
    pub raw: String,
}

impl DecodedPayload {
    /// Record with all optional fields empty.
    pub fn empty(raw: &str, format: PayloadFormat) -> Self {
        Self {
            order_ref: None,
            package_ref: None,
            customer_ref: None,
            format,
            raw: raw.to_string(),
        }
    }
}
