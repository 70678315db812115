// src/utils/time.rs

use chrono::{DateTime, SecondsFormat, Utc};

/// ISO-8601 form used on the wire, e.g. `2026-01-01T12:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_parses_back() {
        let at = parse_timestamp("2026-01-01T12:00:00.250Z").unwrap();
        assert_eq!(format_timestamp(at), "2026-01-01T12:00:00.250Z");
        assert_eq!(parse_timestamp(&format_timestamp(at)), Some(at));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp("not-a-date"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
