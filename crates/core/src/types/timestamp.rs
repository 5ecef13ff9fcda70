//! Lenient timestamp parsing for API payloads.
//!
//! The event API emits naive datetimes (`2025-08-15T18:00:00`) for most
//! fields, while persisted client state uses RFC 3339. Both are read as UTC.
//! Use with `#[serde(with = "eventdesk_core::timestamp")]` or
//! `#[serde(with = "eventdesk_core::timestamp::option")]`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a timestamp in any of the formats the API is known to produce.
///
/// Returns `None` if no format matches.
#[must_use]
pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serialize as RFC 3339.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

/// Deserialize from RFC 3339, naive datetime, or plain date.
///
/// # Errors
///
/// Returns a custom error if the string matches none of the known formats.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
}

/// Same as the parent module, for optional fields.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as RFC 3339 or `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => super::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional timestamp.
    ///
    /// # Errors
    ///
    /// Returns a custom error if a present value matches no known format.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                super::parse(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!("unrecognized timestamp: {raw}"))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_parse_formats() {
        let rfc = parse("2025-08-15T18:00:00+02:00").unwrap();
        assert_eq!(rfc.hour(), 16);

        let naive = parse("2025-08-15T18:00:00").unwrap();
        assert_eq!(naive.hour(), 18);

        let fractional = parse("2025-08-15T18:00:00.123456").unwrap();
        assert_eq!(fractional.minute(), 0);

        let date = parse("2025-08-15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2025, 8, 15));

        assert!(parse("next tuesday").is_none());
    }

    #[test]
    fn test_serde_helpers() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Row {
            #[serde(with = "crate::types::timestamp")]
            at: DateTime<Utc>,
            #[serde(with = "crate::types::timestamp::option", default)]
            until: Option<DateTime<Utc>>,
        }

        let row: Row = serde_json::from_str(r#"{"at":"2025-01-02T03:04:05"}"#).unwrap();
        assert!(row.until.is_none());
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("2025-01-02T03:04:05+00:00"));
        assert!(serde_json::from_str::<Row>(r#"{"at":"soon"}"#).is_err());
    }
}
