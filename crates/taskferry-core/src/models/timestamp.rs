//! ISO-8601 timestamp helpers.
//!
//! Timestamps are stored as the strings the apps wrote so that round-trips
//! never reformat them. Parsing accepts RFC 3339, naive date-times (read as
//! UTC) and bare dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Parse an ISO-8601 timestamp.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Milliseconds since the Unix epoch, `0` when the value does not parse.
pub fn timestamp_ms(value: &str) -> i64 {
    parse_timestamp(value).map_or(0, |parsed| parsed.timestamp_millis())
}

/// Same as [`timestamp_ms`] for optional fields.
pub fn optional_timestamp_ms(value: Option<&str>) -> i64 {
    value.map_or(0, timestamp_ms)
}

/// Render an instant the way the apps do (`2024-01-02T03:04:05.678Z`).
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
