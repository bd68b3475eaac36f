//! Payload decoding
//!
//! Turns an opaque scanned string into structured fields. Pure and total:
//! `decode` never fails, and the same input always yields the same output.
//! Rules form a priority cascade; each field is claimed by at most one
//! winning rule, never stitched together from two.

mod rules;

use tagdesk_common::db::models::{DecodedPayload, PayloadFormat};

/// Decode a raw scanned payload.
///
/// Cascade order:
/// 1. empty input → empty record, [`PayloadFormat::Unknown`];
/// 2. caret-delimited frame (≥ 4 `^`-separated fields) → positional fields;
/// 3. pattern matching over free text; if no pattern hits either, the result
///    is an empty record tagged [`PayloadFormat::Text`].
pub fn decode(raw: &str) -> DecodedPayload {
    if raw.trim().is_empty() {
        return DecodedPayload::empty(raw, PayloadFormat::Unknown);
    }

    if let Some(decoded) = rules::caret_separated(raw) {
        return decoded;
    }

    rules::pattern_matching(raw)
}
