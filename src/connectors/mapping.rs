//! Helpers shared by the source mappers: lookup tables, timestamp parsing and
//! credential checks.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use crate::connectors::ConnectorError;
use crate::models::integration::Model as Integration;

/// Case-insensitive lookup of `value` in `table`, falling back to `default`
/// for unknown or missing input.
pub fn lookup<T: Copy>(table: &[(&str, T)], value: Option<&str>, default: T) -> T {
    value
        .map(str::trim)
        .and_then(|v| {
            table
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(v))
                .map(|(_, mapped)| *mapped)
        })
        .unwrap_or(default)
}

/// Parses the timestamp shapes the supported sources emit: RFC 3339 and
/// Jira's `2024-01-02T10:00:00.000+0000`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Non-empty trimmed string or `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Recognizes values copied verbatim from setup templates.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    v.is_empty()
        || v.starts_with("your-")
        || v.starts_with("your_")
        || (v.starts_with('<') && v.ends_with('>'))
        || v == "changeme"
        || v == "placeholder"
        || (v.len() >= 3 && v.chars().all(|c| c == 'x'))
}

/// Rejects missing or placeholder credentials with a configuration error.
pub fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, ConnectorError> {
    if is_placeholder(value) {
        Err(ConnectorError::configuration(format!(
            "{} is missing or still a placeholder",
            field
        )))
    } else {
        Ok(value.trim())
    }
}

/// Decodes the integration's source-specific settings.
pub fn parse_config<T: DeserializeOwned>(integration: &Integration) -> Result<T, ConnectorError> {
    serde_json::from_value(integration.config.clone()).map_err(|err| {
        ConnectorError::configuration(format!(
            "integration {} has an invalid {} config: {}",
            integration.id, integration.source, err
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lookup_is_case_insensitive_with_default() {
        let table = [("High", 3), ("Low", 1)];
        assert_eq!(lookup(&table, Some(" high "), 0), 3);
        assert_eq!(lookup(&table, Some("Medium"), 0), 0);
        assert_eq!(lookup(&table, None, 0), 0);
    }

    #[test]
    fn parses_rfc3339_and_jira_offsets() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T10:00:00.000+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T12:00:00.000+0200"), Some(expected));
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn placeholders_are_detected() {
        for value in ["", "  ", "your-api-token", "<token>", "changeme", "xxxxxx"] {
            assert!(is_placeholder(value), "{value:?} should be a placeholder");
        }
        assert!(!is_placeholder("ATATT3xFfGF0"));
    }

    #[test]
    fn require_trims_real_values() {
        assert_eq!(require("email", " a@b.co ").unwrap(), "a@b.co");
        let err = require("email", "your-email").unwrap_err();
        assert!(err.to_string().contains("email is missing"));
    }
}
