//! Helpers shared by the per-provider normalizers.
//!
//! Nothing in here returns an error: unparseable inputs fall back to the fetch time or a
//! placeholder label.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc,
    Weekday,
};

use crate::model::{DailyForecast, HourlyForecast, MAX_DAILY, MAX_HOURLY};

pub const NOW_LABEL: &str = "Now";
pub const TODAY_LABEL: &str = "Today";
pub const UNKNOWN_TIME_LABEL: &str = "--";

/// Integer Celsius, truncated toward zero.
pub fn truncate_temp(value: f64) -> i32 {
    value as i32
}

pub fn ms_to_kmh(ms: f64) -> f64 {
    ms * 3.6
}

/// `0 -> 12AM`, `13 -> 1PM`.
pub fn hour_label(hour: u32) -> String {
    let suffix = if hour < 12 { "AM" } else { "PM" };
    let h12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{h12}{suffix}")
}

pub fn hourly_label(index: usize, local: Option<NaiveDateTime>) -> String {
    match (index, local) {
        (0, _) => NOW_LABEL.to_string(),
        (_, Some(dt)) => hour_label(dt.hour()),
        (_, None) => UNKNOWN_TIME_LABEL.to_string(),
    }
}

fn weekday_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

pub fn day_label(index: usize, iso_date: &str) -> String {
    if index == 0 {
        return TODAY_LABEL.to_string();
    }
    match (index, parse_date(iso_date)) {
        (1..=6, Some(date)) => weekday_abbrev(date.weekday()).to_string(),
        _ => format!("Day {index}"),
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Local wall-clock time in the formats the vendors use.
pub fn parse_local_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] =
        ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub fn offset_from_secs(secs: i32) -> FixedOffset {
    FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
}

/// Epoch milliseconds for a local wall-clock time at `offset`.
pub fn local_to_epoch_ms(local: NaiveDateTime, offset: FixedOffset) -> Option<i64> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.timestamp_millis())
}

pub fn epoch_secs_to_local(secs: i64, offset: FixedOffset) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.with_timezone(&offset).naive_local())
}

pub fn truncate_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Index of the first point at or after `from`. When every point is in the past this is
/// `points.len()`, leaving nothing to show. Without `from` the series starts at 0.
pub fn first_index_from<T>(
    points: &[T],
    from: Option<NaiveDateTime>,
    time_of: impl Fn(&T) -> Option<NaiveDateTime>,
) -> usize {
    let Some(from) = from else { return 0 };
    points
        .iter()
        .position(|p| time_of(p).is_some_and(|t| t >= from))
        .unwrap_or(points.len())
}

/// Enforces the series length limits.
pub fn cap_series(hourly: &mut Vec<HourlyForecast>, daily: &mut Vec<DailyForecast>) {
    hourly.truncate(MAX_HOURLY);
    daily.truncate(MAX_DAILY);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_labels() {
        assert_eq!(hour_label(0), "12AM");
        assert_eq!(hour_label(1), "1AM");
        assert_eq!(hour_label(11), "11AM");
        assert_eq!(hour_label(12), "12PM");
        assert_eq!(hour_label(13), "1PM");
        assert_eq!(hour_label(23), "11PM");
    }

    #[test]
    fn first_hourly_label_is_now() {
        let dt = parse_local_datetime("2024-01-15T13:00");
        assert_eq!(hourly_label(0, dt), "Now");
        assert_eq!(hourly_label(1, dt), "1PM");
        assert_eq!(hourly_label(2, None), UNKNOWN_TIME_LABEL);
    }

    #[test]
    fn day_labels() {
        // 2024-01-15 is a Monday
        assert_eq!(day_label(0, "2024-01-15"), "Today");
        assert_eq!(day_label(1, "2024-01-16"), "Tue");
        assert_eq!(day_label(6, "2024-01-21"), "Sun");
        assert_eq!(day_label(7, "2024-01-22"), "Day 7");
        assert_eq!(day_label(3, "garbage"), "Day 3");
    }

    #[test]
    fn temperatures_truncate_toward_zero() {
        assert_eq!(truncate_temp(21.9), 21);
        assert_eq!(truncate_temp(-3.7), -3);
        assert_eq!(truncate_temp(-0.4), 0);
    }

    #[test]
    fn wind_conversion() {
        assert!((ms_to_kmh(10.0) - 36.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_vendor_formats() {
        assert!(parse_local_datetime("2024-01-15T13:00").is_some());
        assert!(parse_local_datetime("2024-01-15 13:00").is_some());
        assert!(parse_local_datetime("2024-01-15 13:00:00").is_some());
        assert!(parse_local_datetime("13:00").is_none());
    }

    #[test]
    fn local_time_round_trip_through_offset() {
        let offset = offset_from_secs(3600);
        let local = parse_local_datetime("2024-01-15T13:00").unwrap();
        let ms = local_to_epoch_ms(local, offset).unwrap();
        assert_eq!(epoch_secs_to_local(ms / 1000, offset), Some(local));
    }

    #[test]
    fn first_index_skips_past_points() {
        let points = ["2024-01-15T10:00", "2024-01-15T11:00", "2024-01-15T12:00"];
        let from = parse_local_datetime("2024-01-15T11:00");
        assert_eq!(first_index_from(&points, from, |p| parse_local_datetime(p)), 1);
        assert_eq!(first_index_from(&points, None, |p| parse_local_datetime(p)), 0);
    }

    #[test]
    fn first_index_past_the_end_when_all_points_are_old() {
        let points = ["2024-01-15T00:00", "2024-01-15T01:00", "2024-01-15T04:00"];
        let from = parse_local_datetime("2024-01-15T13:00");
        assert_eq!(first_index_from(&points, from, |p| parse_local_datetime(p)), points.len());
        assert_eq!(points.iter().skip(points.len()).count(), 0);
    }
}
