//! Timestamp helpers.
//!
//! All timestamps are stored as UTC RFC 3339 strings with second precision
//! (`2025-01-31T09:30:00Z`), so string order equals chronological order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

/// Parses a stored or user-supplied timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) and bare dates (midnight UTC).
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Normalizes user input to the stored format, or `None` when unparseable.
pub fn normalize_ts(raw: &str) -> Option<String> {
    parse_ts(raw).map(format_ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accepts_common_shapes() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_ts("2025-03-01"), Some(expected));
        assert_eq!(parse_ts("2025-03-01 00:00:00"), Some(expected));
        assert_eq!(parse_ts("2025-03-01T03:00:00+03:00"), Some(expected));
        assert_eq!(parse_ts("yesterday"), None);
    }

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let a = format_ts(Utc.with_ymd_and_hms(2025, 1, 9, 23, 0, 0).unwrap());
        let b = format_ts(Utc.with_ymd_and_hms(2025, 1, 10, 1, 0, 0).unwrap());
        assert_eq!(a, "2025-01-09T23:00:00Z");
        assert!(a < b);
    }
}
