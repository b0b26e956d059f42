//! Timestamp normalization.
//!
//! Every instant entering comparison logic carries an explicit offset.
//! Naive inputs are pinned to the configured fixed offset, never to the
//! host machine's local zone, so results do not depend on where the
//! process happens to run.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{ClipError, ClipResult};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a user-supplied timestamp into a timezone-aware instant.
///
/// Accepts extended ISO-8601 with optional fractional seconds; a `Z`
/// suffix is UTC. Inputs without an offset are given `assume`.
pub fn parse_timestamp(raw: &str, assume: FixedOffset) -> ClipResult<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClipError::MalformedTimestamp("empty timestamp".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return naive
                .and_local_timezone(assume)
                .single()
                .ok_or_else(|| ClipError::MalformedTimestamp(trimmed.to_string()));
        }
    }

    Err(ClipError::MalformedTimestamp(trimmed.to_string()))
}

/// Render an instant the way the transcript index expects it:
/// UTC-normalized RFC 3339 with a literal `Z` suffix.
pub fn format_timestamp_for_query(dt: &DateTime<FixedOffset>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
