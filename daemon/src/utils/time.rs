//! Timestamp helpers. All persisted times are UTC, RFC 3339 with millisecond
//! precision and a `Z` suffix, so the stored strings order lexicographically.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Formats a time the way it is persisted and sent over the wire.
pub fn to_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current UTC time in persisted form.
pub fn now_timestamp() -> String {
    to_timestamp(now_utc())
}

/// Parses a persisted timestamp. Returns `None` for anything that is not
/// valid RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
