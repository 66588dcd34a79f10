//! Parsing of the site's Russian-language publication dates.
//!
//! The API reports dates as `"5 января 2024"` and times as `"09:30"`, both in
//! Moscow civil time.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("malformed date {0:?}")]
    Date(String),

    #[error("malformed time {0:?}")]
    Time(String),

    #[error("unknown month {0:?}")]
    Month(String),

    #[error("date {date:?} {time:?} is out of range")]
    OutOfRange { date: String, time: String },
}

static RE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s+(\p{L}+)\s+(\d{4})$").unwrap());
static RE_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

// Genitive forms, as used after a day number.
const MONTHS: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Moscow civil time. Fixed at UTC+03:00 with no daylight saving since 2014.
pub fn moscow() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid offset")
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

/// Converts a local date and time-of-day in `zone` into a UTC instant.
///
/// Seconds are always zero. Nothing is returned unless every component is
/// well formed and in range: `"32 января 2024"` and `"25:00"` both fail.
pub fn make_timestamp(
    date: &str,
    time: &str,
    zone: &FixedOffset,
) -> Result<DateTime<Utc>, TimestampError> {
    let date = date.trim();
    let time = time.trim();

    let d = RE_DATE
        .captures(date)
        .ok_or_else(|| TimestampError::Date(date.to_string()))?;
    let t = RE_TIME
        .captures(time)
        .ok_or_else(|| TimestampError::Time(time.to_string()))?;

    let month = month_number(&d[2]).ok_or_else(|| TimestampError::Month(d[2].to_string()))?;

    let out_of_range = || TimestampError::OutOfRange {
        date: date.to_string(),
        time: time.to_string(),
    };

    // the regexes bound every field to a handful of digits, so these parse
    let day: u32 = d[1].parse().map_err(|_| out_of_range())?;
    let year: i32 = d[3].parse().map_err(|_| out_of_range())?;
    let hour: u32 = t[1].parse().map_err(|_| out_of_range())?;
    let minute: u32 = t[2].parse().map_err(|_| out_of_range())?;

    let local = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(out_of_range)?;

    zone.from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(out_of_range)
}
