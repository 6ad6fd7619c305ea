use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use std::fmt::Display;

pub type EpochMillis = u64;

pub fn now_epoch_millis() -> EpochMillis {
    Utc::now().timestamp_millis().max(0) as EpochMillis
}

/// `HH:MM:SS` in local time.
pub fn clock_label(at_ms: EpochMillis) -> String {
    format_in(at_ms, &Local, "%H:%M:%S")
}

/// `YYYY-MM-DD` in local time.
pub fn date_label(at_ms: EpochMillis) -> String {
    format_in(at_ms, &Local, "%Y-%m-%d")
}

/// Local hour of day, 0 to 23.
pub fn hour_of_day(at_ms: EpochMillis) -> u32 {
    at_in(at_ms, &Local).hour()
}

/// Local day of week with Sunday as 0.
pub fn day_of_week(at_ms: EpochMillis) -> u32 {
    at_in(at_ms, &Local).weekday().num_days_from_sunday()
}

fn at_in<Tz: TimeZone>(at_ms: EpochMillis, zone: &Tz) -> DateTime<Tz> {
    zone.timestamp_millis_opt(at_ms as i64)
        .earliest()
        .unwrap_or_else(|| Utc::now().with_timezone(zone))
}

fn format_in<Tz: TimeZone>(at_ms: EpochMillis, zone: &Tz, pattern: &str) -> String
where
    Tz::Offset: Display,
{
    at_in(at_ms, zone).format(pattern).to_string()
}
