//! Timestamp utilities
//!
//! All timestamps are kept at millisecond precision so they survive a round
//! trip through the INTEGER columns in SQLite unchanged.

use chrono::{DateTime, SubsecRound, Utc};

/// Get current UTC timestamp, truncated to milliseconds
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Convert a timestamp to Unix epoch milliseconds (storage format)
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert Unix epoch milliseconds back to a timestamp
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_now_has_no_sub_millisecond_component() {
        let timestamp = now();
        assert_eq!(timestamp.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_millis_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(from_millis(to_millis(ts)), Some(ts));
    }

    #[test]
    fn test_now_round_trips_through_millis() {
        let ts = now();
        assert_eq!(from_millis(to_millis(ts)), Some(ts));
    }
}
