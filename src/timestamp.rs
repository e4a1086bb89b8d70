//! Request instants.
//!
//! Callers send RFC 3339 strings, zone-less ISO-8601 date-times or integer
//! epoch seconds. Everything is normalized to UTC; a missing zone means UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Whole epoch seconds of an instant, fractions truncated.
pub fn epoch_seconds(at: &DateTime<Utc>) -> i64 {
    at.timestamp()
}

/// UTC instant at an epoch second, saturating at the representable range.
pub fn from_epoch_seconds(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(if secs < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Parse a textual instant.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(with_zone) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_zone.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInstant {
    Epoch(i64),
    Text(String),
}

/// Serde `deserialize_with` helper for request timestamps.
pub fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawInstant::deserialize(deserializer)? {
        RawInstant::Epoch(secs) => DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| serde::de::Error::custom(format!("epoch {} out of range", secs))),
        RawInstant::Text(raw) => parse_instant(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
    }
}
