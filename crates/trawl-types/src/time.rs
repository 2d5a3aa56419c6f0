//! UNIX / ISO-8601 time helpers.
//!
//! Exchanges report execution times as UNIX seconds, milliseconds,
//! nanoseconds or ISO-8601 strings. Everything is normalized to whole
//! UNIX seconds (UTC), truncating sub-second precision.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::TimeRangeError;

/// Formats UNIX seconds as ISO-8601 (`2018-01-01T00:00:00Z`).
#[must_use]
pub fn unix_to_iso(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map_or_else(
        || timestamp.to_string(),
        |dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )
}

/// Parses an exchange time string into UNIX seconds.
///
/// Accepts RFC 3339 (`2017-06-01T12:00:00.123Z`), naive
/// `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM:SS`, bare dates
/// (midnight UTC) and integer UNIX seconds.
///
/// # Errors
///
/// Returns an error if none of the formats match.
pub fn iso_to_unix(value: &str) -> Result<i64, TimeRangeError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(Utc.from_utc_datetime(&dt).timestamp());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).timestamp());
    }
    value
        .parse::<i64>()
        .map_err(|_| TimeRangeError::InvalidTimestamp(value.to_string()))
}

/// Converts milliseconds to whole seconds, flooring.
#[must_use]
pub const fn millis_to_secs(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

/// Converts a fractional-seconds string (`"1500000000.1234"`) to whole seconds.
#[must_use]
pub fn fractional_to_secs(value: f64) -> i64 {
    value.floor() as i64
}

/// Returns the current UNIX time in seconds.
#[must_use]
pub fn now() -> i64 {
    Utc::now().timestamp()
}
