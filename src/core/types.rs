/*!
 * Core Types
 * Common types and timestamp handling shared by sampling and analysis
 */

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

/// Process ID type
pub type Pid = u32;

/// Wall-clock sample time (local, millisecond precision, no offset)
pub type Timestamp = PrimitiveDateTime;

/// Log column format: `2024-05-01T12:00:00.250`
const LOG_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

/// Report format with milliseconds
const DISPLAY_MILLIS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

/// Report format truncated to seconds
const DISPLAY_SECONDS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Session token embedded in log file names
const SESSION_TOKEN: &[FormatItem<'static>] =
    format_description!("[year][month][day]-[hour][minute][second]");

const PARSE_WITH_FRACTION: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const PARSE_WHOLE_SECONDS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const PARSE_TIME_FRACTION: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond]");
const PARSE_TIME_WHOLE: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Current local time truncated to milliseconds
///
/// Falls back to UTC when the local offset cannot be determined (for example
/// in multi-threaded processes on some Unix platforms).
pub fn now_local() -> Timestamp {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let naive = PrimitiveDateTime::new(now.date(), now.time());
    naive.replace_millisecond(naive.millisecond()).unwrap_or(naive)
}

/// Format a timestamp for the log's first column
pub fn format_log_timestamp(ts: Timestamp) -> String {
    ts.format(LOG_TIMESTAMP).unwrap_or_else(|_| ts.to_string())
}

/// Format a timestamp with milliseconds for human-readable output
pub fn format_display_millis(ts: Timestamp) -> String {
    ts.format(DISPLAY_MILLIS).unwrap_or_else(|_| ts.to_string())
}

/// Format a timestamp truncated to seconds
pub fn format_display_seconds(ts: Timestamp) -> String {
    ts.format(DISPLAY_SECONDS).unwrap_or_else(|_| ts.to_string())
}

/// Format the session token used in log file names
pub fn format_session_token(ts: Timestamp) -> String {
    ts.format(SESSION_TOKEN).unwrap_or_else(|_| ts.to_string())
}

/// Parse a full date-time in either `T`- or space-separated form, with or
/// without fractional seconds
pub fn parse_timestamp(input: &str) -> Result<Timestamp, time::error::Parse> {
    let normalized = input.trim().replacen('T', " ", 1);
    if normalized.contains('.') {
        PrimitiveDateTime::parse(&normalized, PARSE_WITH_FRACTION)
    } else {
        PrimitiveDateTime::parse(&normalized, PARSE_WHOLE_SECONDS)
    }
}

/// Parse a bare time of day (`HH:MM:SS[.fff]`)
pub fn parse_time_of_day(input: &str) -> Result<Time, time::error::Parse> {
    let trimmed = input.trim();
    if trimmed.contains('.') {
        Time::parse(trimmed, PARSE_TIME_FRACTION)
    } else {
        Time::parse(trimmed, PARSE_TIME_WHOLE)
    }
}

/// Drop the sub-second part of a timestamp
pub fn floor_to_second(ts: Timestamp) -> Timestamp {
    ts.replace_nanosecond(0).unwrap_or(ts)
}

/// Truncate to the second, then advance by one second
///
/// Applied unconditionally so a bound given as `…:45` covers every sample
/// logged during second 45.
pub fn ceil_to_next_second(ts: Timestamp) -> Timestamp {
    floor_to_second(ts) + time::Duration::SECOND
}

/// Seconds elapsed from `start` to `end` (negative if reversed)
pub fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    (end - start).as_seconds_f64()
}

/// Combine a reference date with a time of day
pub fn at_date(date: Date, time: Time) -> Timestamp {
    PrimitiveDateTime::new(date, time)
}
