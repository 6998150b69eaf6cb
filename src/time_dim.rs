//! Expands epoch-millisecond timestamps into `time` dimension rows.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

use crate::error::ParseError;
use crate::models::TimeEntry;

/// Convert event `ts` (milliseconds since the Unix epoch, UTC) into a naive UTC timestamp.
pub fn timestamp_from_millis(ts: i64) -> Result<NaiveDateTime, ParseError> {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.naive_utc())
        .ok_or(ParseError::TimestampOutOfRange(ts))
}

/// Derive the calendar fields for one event timestamp.
///
/// Pure: the same `ts` always yields the same entry. Weekday counts Monday = 0,
/// week is the ISO-8601 week number.
pub fn derive_time_entry(ts: i64) -> Result<TimeEntry, ParseError> {
    let start_time = timestamp_from_millis(ts)?;
    Ok(TimeEntry {
        start_time,
        hour: start_time.hour(),
        day: start_time.day(),
        week: start_time.iso_week().week(),
        month: start_time.month(),
        year: start_time.year(),
        weekday: start_time.weekday().num_days_from_monday(),
    })
}
