/*!
 * Analysis Window
 * Half-open time range over which statistics are computed
 */

use super::AnalysisError;
use crate::core::types::{
    at_date, ceil_to_next_second, floor_to_second, format_display_seconds, parse_time_of_day,
    parse_timestamp,
};
use crate::core::Timestamp;
use time::Date;

/// `[start, end)` with whole-second bounds
///
/// The start is floored to its second. The end is truncated to its second and
/// then advanced by one, so `12:00:45` and `12:00:45.300` both end at
/// `12:00:46` and every sample logged during second 45 is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    start: Timestamp,
    end: Timestamp,
}

impl AnalysisWindow {
    /// Window from raw bounds, normalized as described on the type
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, AnalysisError> {
        let start = floor_to_second(start);
        let end = ceil_to_next_second(end);
        if end <= start {
            return Err(AnalysisError::InvalidWindow {
                input: format!(
                    "{} ~ {}",
                    format_display_seconds(start),
                    format_display_seconds(end)
                ),
                reason: "end is before start".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Window covering every timestamp from `first` to `last`
    pub fn covering(first: Timestamp, last: Timestamp) -> Self {
        let start = floor_to_second(first.min(last));
        let end = ceil_to_next_second(first.max(last));
        Self { start, end }
    }

    /// Parse `START,END`
    ///
    /// Each side is a full date-time (`YYYY-MM-DD HH:MM:SS[.fff]`, `T` also
    /// accepted) or a bare time of day, which is placed on `reference_date`.
    pub fn parse(input: &str, reference_date: Date) -> Result<Self, AnalysisError> {
        let invalid = |reason: &str| AnalysisError::InvalidWindow {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (start, end) = input
            .split_once(',')
            .ok_or_else(|| invalid("expected START,END"))?;
        if end.contains(',') {
            return Err(invalid("expected exactly two bounds"));
        }

        let start = parse_bound(start, reference_date)
            .ok_or_else(|| invalid("start is not a valid time"))?;
        let end =
            parse_bound(end, reference_date).ok_or_else(|| invalid("end is not a valid time"))?;

        Self::new(start, end).map_err(|_| invalid("end is before start"))
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Length of the window in seconds
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).as_seconds_f64()
    }
}

fn parse_bound(text: &str, reference_date: Date) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    parse_timestamp(text)
        .ok()
        .or_else(|| parse_time_of_day(text).ok().map(|t| at_date(reference_date, t)))
}
