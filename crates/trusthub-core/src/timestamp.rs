//! Second-precision UTC timestamps in RFC 3339 form with a `Z` suffix.
//!
//! Used as a serde `with` module for every timestamp that ends up inside a
//! signed payload, so signer and verifier always agree on the textual form.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Current time truncated to whole seconds.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

/// Drop sub-second precision.
pub fn truncate(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Render as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse any RFC 3339 timestamp, normalizing to UTC and whole seconds.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| truncate(dt.with_timezone(&Utc)))
}

/// Parse only the exact form [`format`] produces.
///
/// Signed payloads must round-trip byte for byte, so fractional seconds,
/// numeric offsets and lowercase separators are refused here.
pub fn parse_exact(s: &str) -> Result<DateTime<Utc>, String> {
    let dt = parse(s).map_err(|e| e.to_string())?;
    if format(&dt) != s {
        return Err(format!("timestamp {s:?} is not in YYYY-MM-DDTHH:MM:SSZ form"));
    }
    Ok(dt)
}

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(dt))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_exact(&raw).map_err(de::Error::custom)
}

/// `Option<DateTime<Utc>>` variant of the same format.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match dt {
            Some(dt) => super::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| super::parse_exact(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
