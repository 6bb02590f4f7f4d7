//! Timestamp normalization.
//!
//! The calendar API wants offset-aware ISO 8601 timestamps, while the model
//! often produces naive ones ("2025-03-01T10:00:00"). Naive inputs are taken
//! to already be wall-clock time in the configured zone and are stamped with
//! its offset; aware inputs are converted into that zone.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use chrono_tz::Tz;
use tailortalk_core::error::CalendarError;

/// Offset-aware formats tried after RFC 3339.
const AWARE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an IANA timezone name such as `Asia/Kolkata`.
pub fn parse_timezone(name: &str) -> Result<Tz, CalendarError> {
    name.parse::<Tz>()
        .map_err(|_| CalendarError::UnknownTimezone(name.to_string()))
}

/// Parse `input` and express it in `tz`.
pub fn normalize(input: &str, tz: Tz) -> Result<DateTime<Tz>, CalendarError> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&tz));
    }
    for fmt in AWARE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&tz));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| CalendarError::InvalidTimestamp(input.to_string()))?;

    // `earliest` resolves DST overlaps; a DST gap has no valid local time.
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| CalendarError::InvalidTimestamp(input.to_string()))
}

/// Render as RFC 3339 with the zone's numeric offset.
pub fn to_iso(dt: &DateTime<Tz>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parse `input` and render it as an ISO 8601 string in `tz`.
pub fn normalize_timestamp(input: &str, tz: Tz) -> Result<String, CalendarError> {
    normalize(input, tz).map(|dt| to_iso(&dt))
}
