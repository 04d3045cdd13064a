//! Timestamp utilities

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `now()` plus `days`, or `None` when the result is out of range
pub fn days_from_now(days: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(days).and_then(|delta| now().checked_add_signed(delta))
}

/// `now()` plus `minutes`, or `None` when the result is out of range
pub fn minutes_from_now(minutes: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_minutes(minutes).and_then(|delta| now().checked_add_signed(delta))
}

/// Parse a date/time sent by a client
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`, `2024-05-01T10:00:00.123+02:00`),
/// naive date-times (`2024-05-01T10:00[:00]`, taken as UTC) and bare dates
/// (`2024-05-01`, midnight UTC). Returns `None` for anything else.
pub fn parse_client_datetime(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_offsets_from_now() {
        let week = days_from_now(7).unwrap();
        assert_eq!((week - now()).num_days(), 6);
        assert!(minutes_from_now(30).unwrap() > now());
        assert!(minutes_from_now(-30).unwrap() < now());
    }

    #[test]
    fn test_offsets_out_of_range() {
        assert!(days_from_now(1_000_000_000_000).is_none());
        assert!(days_from_now(i64::MAX).is_none());
        assert!(minutes_from_now(i64::MAX).is_none());
        assert!(minutes_from_now(1_000_000_000_000).is_none());
    }

    #[test]
    fn test_parse_rfc3339_with_z() {
        let dt = parse_client_datetime("2024-05-01T10:30:00.000Z").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_parse_rfc3339_with_offset_normalizes_to_utc() {
        let dt = parse_client_datetime("2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_naive_datetime() {
        let dt = parse_client_datetime("2023-12-24T18:45").unwrap();
        assert_eq!(dt.day(), 24);
        assert_eq!(dt.hour(), 18);
        assert_eq!(dt.minute(), 45);
    }

    #[test]
    fn test_parse_bare_date() {
        let dt = parse_client_datetime("2020-02-29").unwrap();
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 29);
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_client_datetime("").is_none());
        assert!(parse_client_datetime("yesterday").is_none());
        assert!(parse_client_datetime("2021-02-30").is_none());
    }
}
