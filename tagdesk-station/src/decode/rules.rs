//! Decode rules
//!
//! Each rule is a pure function: it either claims its fields or abstains,
//! and the dispatcher in `mod.rs` owns the priority order. Patterns are
//! compiled once; a pattern that fails to compile simply never matches.

use regex::Regex;
use std::sync::LazyLock;
use tagdesk_common::db::models::{DecodedPayload, PayloadFormat};

/// Order token: two-letter prefix plus digits, e.g. `AB-12345`.
static RE_ORDER_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z]{2}-\d+\b").ok());

/// Package code: first run of at least ten digits.
static RE_PACKAGE_DIGITS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{10,}").ok());

/// Labeled order reference fallback.
static RE_ORDER_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)referenz:\s*([A-Za-z0-9/_-]+)").ok());

/// Labeled tracking code fallback.
static RE_TRACKING_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)tracking:\s*([A-Za-z0-9]+)").ok());

/// Labeled customer name; the segment runs to the end of the line and is
/// trimmed at the next recognized label.
static RE_CUSTOMER_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)kundenname:\s*([^\r\n]*)").ok());

/// Any label this decoder recognizes, used to trim the customer segment.
static RE_NEXT_LABEL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:referenz|tracking|kundenname)\s*:").ok());

fn non_empty(field: &str) -> Option<String> {
    let trimmed = field.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn find_match(re: &LazyLock<Option<Regex>>, raw: &str) -> Option<String> {
    re.as_ref()
        .and_then(|re| re.find(raw))
        .map(|m| m.as_str().to_string())
}

fn capture(re: &LazyLock<Option<Regex>>, raw: &str) -> Option<String> {
    re.as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .and_then(|m| non_empty(m.as_str()))
}

/// Caret-delimited frame: at least three `^` separators (four fields).
/// Field 1 is the order reference, field 3 the package code, field 2 the raw
/// customer field, carried as a labeled reference.
pub(super) fn caret_separated(raw: &str) -> Option<DecodedPayload> {
    let fields: Vec<&str> = raw.split('^').collect();
    if fields.len() < 4 {
        return None;
    }

    Some(DecodedPayload {
        order_ref: non_empty(fields[1]),
        package_ref: non_empty(fields[3]),
        customer_ref: non_empty(fields[2]).map(|customer| format!("Kunde: {customer}")),
        format: PayloadFormat::CaretSeparated,
        raw: raw.to_string(),
    })
}

/// Pattern matching over free text. Each field tries its primary pattern
/// first and its labeled fallback second; a field that stays empty stays
/// empty. Abstains into a plain `Text` record when nothing hits.
pub(super) fn pattern_matching(raw: &str) -> DecodedPayload {
    let order_ref = find_match(&RE_ORDER_TOKEN, raw).or_else(|| capture(&RE_ORDER_LABEL, raw));
    let package_ref =
        find_match(&RE_PACKAGE_DIGITS, raw).or_else(|| capture(&RE_TRACKING_LABEL, raw));
    let customer_ref = customer_segment(raw);

    if order_ref.is_none() && package_ref.is_none() && customer_ref.is_none() {
        return DecodedPayload::empty(raw, PayloadFormat::Text);
    }

    DecodedPayload {
        order_ref,
        package_ref,
        customer_ref,
        format: PayloadFormat::PatternMatching,
        raw: raw.to_string(),
    }
}

fn customer_segment(raw: &str) -> Option<String> {
    let segment = capture(&RE_CUSTOMER_LABEL, raw)?;

    let cut = RE_NEXT_LABEL
        .as_ref()
        .and_then(|re| re.find(&segment))
        .map(|m| m.start());

    let segment = match cut {
        Some(idx) => &segment[..idx],
        None => &segment[..],
    };

    non_empty(segment)
}
