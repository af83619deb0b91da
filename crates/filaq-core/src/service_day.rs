// SPDX-FileCopyrightText: 2026 Filaq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service-day clock.
//!
//! A shop's operating day starts at a configurable shift-start hour, not
//! at midnight: the current service day is the calendar date of
//! `now - shift_start_hour`. A shop open past midnight therefore stays on
//! one continuous day. All same-day aggregates (daily cap, current-number
//! display) use this window, never the raw calendar day.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// The current service day and its half-open UTC window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDayWindow {
    /// Service day as YYYY-MM-DD.
    pub date: String,
    /// Window start, RFC 3339.
    pub start: String,
    /// Window end (start + 24h), RFC 3339.
    pub end: String,
}

/// Compute the service day window at an explicit instant.
pub fn service_day_at(now: DateTime<Utc>, shift_start_hour: u8) -> ServiceDayWindow {
    let shift = Duration::hours(i64::from(shift_start_hour));
    let date = (now - shift).date_naive();
    // Midnight of the shifted date always exists in UTC.
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    let start = midnight + shift;
    let end = start + Duration::hours(24);
    ServiceDayWindow {
        date: date.format("%Y-%m-%d").to_string(),
        start: to_storage_timestamp(start),
        end: to_storage_timestamp(end),
    }
}

/// Compute the service day window right now.
pub fn service_day(shift_start_hour: u8) -> ServiceDayWindow {
    service_day_at(Utc::now(), shift_start_hour)
}

/// Format an instant the way the storage layer writes timestamps
/// (`strftime('%Y-%m-%dT%H:%M:%fZ')`, millisecond precision), so string
/// comparison in SQL agrees with chrono comparison in Rust.
pub fn to_storage_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Current instant in storage format.
pub fn now_timestamp() -> String {
    to_storage_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn early_morning_belongs_to_previous_day() {
        // 02:30 UTC with a 5 AM shift start is still the previous service day.
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 2, 30, 0).unwrap();
        let day = service_day_at(now, 5);
        assert_eq!(day.date, "2026-08-24");
        assert_eq!(day.start, "2026-08-24T05:00:00.000Z");
        assert_eq!(day.end, "2026-08-25T05:00:00.000Z");
    }

    #[test]
    fn after_shift_start_is_todays_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 5, 0, 1).unwrap();
        let day = service_day_at(now, 5);
        assert_eq!(day.date, "2026-08-25");
        assert_eq!(day.start, "2026-08-25T05:00:00.000Z");
    }

    #[test]
    fn zero_shift_matches_calendar_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap();
        let day = service_day_at(now, 0);
        assert_eq!(day.date, "2026-08-25");
        assert_eq!(day.start, "2026-08-25T00:00:00.000Z");
        assert_eq!(day.end, "2026-08-26T00:00:00.000Z");
    }

    #[test]
    fn storage_timestamps_compare_lexicographically() {
        let a = Utc.with_ymd_and_hms(2026, 8, 25, 5, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 25, 5, 0, 1).unwrap();
        assert!(to_storage_timestamp(a) < to_storage_timestamp(b));
    }

    #[test]
    fn boundary_instant_is_inside_the_new_day() {
        let boundary = Utc.with_ymd_and_hms(2026, 8, 25, 5, 0, 0).unwrap();
        let day = service_day_at(boundary, 5);
        assert_eq!(day.date, "2026-08-25");
        // [start, end): the boundary itself opens the day.
        assert_eq!(day.start, to_storage_timestamp(boundary));
    }
}
