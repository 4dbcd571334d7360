//! Composite key scheme for the single-table ledger.
//!
//! Every row lives under the owning facility's partition key `p-{id}`. The
//! sort key carries a one-character entity tag followed by a fixed-width UTC
//! timestamp, so a lexicographic range scan over sort keys is a chronological
//! scan over one entity kind:
//!
//! - facility record: `p-info` (one per partition)
//! - slot:            `s-{start}~{duration}`
//! - booking:         `b-{start}~{secret_code}`

use crate::utils::error::{LedgerError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

pub const FACILITY_TAG: char = 'p';
pub const SLOT_TAG: char = 's';
pub const BOOKING_TAG: char = 'b';

/// Sort key of the single per-facility info record.
pub const FACILITY_INFO_SK: &str = "p-info";

/// Constant partition value of the entity-type index used to enumerate
/// all facilities.
pub const FACILITY_INDEX_PK: &str = "place";

/// Separator between the timestamp and the trailing identity field of a sort
/// key. `~` sorts after every character that can appear in a timestamp, so
/// suffixed keys stay inside the bare-prefix range bounds.
const FIELD_SEPARATOR: char = '~';

// 20 characters, second precision, always UTC with a literal `Z`.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub fn facility_pk(facility_id: &str) -> String {
    format!("{}-{}", FACILITY_TAG, facility_id)
}

pub fn facility_id_from_pk(pk: &str) -> Result<&str> {
    pk.strip_prefix("p-").ok_or_else(|| LedgerError::KeyError {
        key: pk.to_string(),
        reason: "not a facility partition key".to_string(),
    })
}

pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

/// Strict inverse of [`format_timestamp`]. Anything that does not round-trip
/// byte-for-byte is rejected: a variable-width or offset-bearing timestamp
/// would silently break the order-equals-chronology property of sort keys.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let parsed = NaiveDateTime::parse_from_str(s, TS_FORMAT)?.and_utc();
    if format_timestamp(parsed) != s {
        return Err(LedgerError::KeyError {
            key: s.to_string(),
            reason: "timestamp is not in the fixed-width sortable format".to_string(),
        });
    }
    Ok(parsed)
}

pub fn slot_sk(start: DateTime<Utc>, duration_minutes: u32) -> String {
    format!(
        "{}-{}{}{}",
        SLOT_TAG,
        format_timestamp(start),
        FIELD_SEPARATOR,
        duration_minutes
    )
}

/// Exact inverse of [`slot_sk`].
pub fn decode_slot_sk(sk: &str) -> Result<(DateTime<Utc>, u32)> {
    let body = strip_tag(sk, SLOT_TAG)?;
    let (ts, duration) = body
        .split_once(FIELD_SEPARATOR)
        .ok_or_else(|| malformed(sk, "missing duration field"))?;
    let start = parse_timestamp(ts)?;
    let duration_minutes = duration
        .parse::<u32>()
        .map_err(|_| malformed(sk, "duration is not an integer"))?;
    Ok((start, duration_minutes))
}

/// Timestamp-only booking prefix. The confirmation code is appended by the
/// booking writer; range scans never need it.
pub fn booking_sk_prefix(start: DateTime<Utc>) -> String {
    format!("{}-{}", BOOKING_TAG, format_timestamp(start))
}

pub fn booking_sk(start: DateTime<Utc>, secret_code: &str) -> String {
    format!(
        "{}{}{}",
        booking_sk_prefix(start),
        FIELD_SEPARATOR,
        secret_code
    )
}

/// Exact inverse of [`booking_sk`].
pub fn decode_booking_sk(sk: &str) -> Result<(DateTime<Utc>, String)> {
    let body = strip_tag(sk, BOOKING_TAG)?;
    let (ts, code) = body
        .split_once(FIELD_SEPARATOR)
        .ok_or_else(|| malformed(sk, "missing confirmation code field"))?;
    let start = parse_timestamp(ts)?;
    if code.is_empty() {
        return Err(malformed(sk, "empty confirmation code"));
    }
    Ok((start, code.to_string()))
}

/// Rewrites the leading entity tag of a sort key, leaving the rest of the key
/// untouched. This is a pure string substitution: the matcher derives booking
/// range bounds from slot range bounds without re-deriving the timestamp.
pub fn rewrite_tag(sort_key: &str, to_tag: char) -> Result<String> {
    let mut chars = sort_key.chars();
    match (chars.next(), chars.next()) {
        (Some(tag), Some('-')) if tag == SLOT_TAG || tag == BOOKING_TAG => {
            Ok(format!("{}{}", to_tag, &sort_key[tag.len_utf8()..]))
        }
        _ => Err(malformed(sort_key, "no leading entity tag to rewrite")),
    }
}

/// Inclusive range bounds covering every `tag`-entity whose timestamp falls
/// in `[from, until]`. Keys with a `~`-suffixed identity field at exactly
/// `until` sort above the high bound and are excluded, which keeps the scan
/// window half-open in practice.
pub fn time_scan_bounds(tag: char, from: DateTime<Utc>, until: DateTime<Utc>) -> (String, String) {
    (
        format!("{}-{}", tag, format_timestamp(from)),
        format!("{}-{}", tag, format_timestamp(until)),
    )
}

fn strip_tag(sk: &str, tag: char) -> Result<&str> {
    let prefix = format!("{}-", tag);
    sk.strip_prefix(&prefix)
        .ok_or_else(|| malformed(sk, "unexpected entity tag"))
}

fn malformed(key: &str, reason: &str) -> LedgerError {
    LedgerError::KeyError {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
