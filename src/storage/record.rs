/*!
 * Log Records
 * Sample and failure rows with their fixed 8-column layout
 */

use crate::core::limits::LOG_COLUMNS;
use crate::core::types::{format_log_timestamp, parse_timestamp};
use crate::core::{MemoryUnit, Pid, Timestamp};
use csv::StringRecord;
use thiserror::Error;

/// Column names, in order. Memory columns get the unit appended.
const COLUMN_TIME: &str = "sample_time(ISO8601)";
const COLUMN_PID: &str = "pid";
const COLUMN_NAME: &str = "process_name";
const COLUMN_RSS: &str = "rss";
const COLUMN_VMS: &str = "vms";
const COLUMN_PRIVATE: &str = "private";
const COLUMN_PERCENT: &str = "rss_percent_of_total(%)";
const COLUMN_REMARK: &str = "remark";

/// One successful memory snapshot, already converted to the display unit
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySample {
    pub timestamp: Timestamp,
    pub pid: Pid,
    pub process_name: String,
    pub rss: f64,
    pub vms: f64,
    /// Unique set or rss - shared; 0 when the platform cannot measure it
    pub private_mem: f64,
    pub mem_percent: f64,
}

/// A tick that could not produce a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFailure {
    pub timestamp: Timestamp,
    pub pid: Pid,
    pub process_name: String,
    pub reason: String,
}

/// One log line
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Sample(MemorySample),
    Failure(SampleFailure),
}

impl From<MemorySample> for LogRecord {
    fn from(sample: MemorySample) -> Self {
        LogRecord::Sample(sample)
    }
}

impl From<SampleFailure> for LogRecord {
    fn from(failure: SampleFailure) -> Self {
        LogRecord::Failure(failure)
    }
}

impl LogRecord {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            LogRecord::Sample(s) => s.timestamp,
            LogRecord::Failure(f) => f.timestamp,
        }
    }

    pub fn pid(&self) -> Pid {
        match self {
            LogRecord::Sample(s) => s.pid,
            LogRecord::Failure(f) => f.pid,
        }
    }

    pub fn process_name(&self) -> &str {
        match self {
            LogRecord::Sample(s) => &s.process_name,
            LogRecord::Failure(f) => &f.process_name,
        }
    }

    pub fn as_sample(&self) -> Option<&MemorySample> {
        match self {
            LogRecord::Sample(s) => Some(s),
            LogRecord::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LogRecord::Failure(_))
    }

    /// Serialize to the 8 log columns
    pub fn to_row(&self) -> [String; LOG_COLUMNS] {
        match self {
            LogRecord::Sample(s) => [
                format_log_timestamp(s.timestamp),
                s.pid.to_string(),
                s.process_name.clone(),
                s.rss.to_string(),
                s.vms.to_string(),
                s.private_mem.to_string(),
                s.mem_percent.to_string(),
                String::new(),
            ],
            LogRecord::Failure(f) => [
                format_log_timestamp(f.timestamp),
                f.pid.to_string(),
                f.process_name.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                f.reason.clone(),
            ],
        }
    }

    /// Parse one data row
    pub fn from_row(row: &StringRecord) -> Result<Self, RowError> {
        if row.len() != LOG_COLUMNS {
            return Err(RowError::ColumnCount(row.len()));
        }

        let timestamp =
            parse_timestamp(&row[0]).map_err(|_| RowError::invalid(COLUMN_TIME, &row[0]))?;
        let pid = row[1]
            .trim()
            .parse::<Pid>()
            .map_err(|_| RowError::invalid(COLUMN_PID, &row[1]))?;
        let process_name = row[2].to_string();

        let numeric = [&row[3], &row[4], &row[5], &row[6]];
        if numeric.iter().all(|field| field.trim().is_empty()) {
            let reason = row[7].trim();
            if reason.is_empty() {
                return Err(RowError::invalid(COLUMN_REMARK, ""));
            }
            return Ok(LogRecord::Failure(SampleFailure {
                timestamp,
                pid,
                process_name,
                reason: reason.to_string(),
            }));
        }

        Ok(LogRecord::Sample(MemorySample {
            timestamp,
            pid,
            process_name,
            rss: parse_number(COLUMN_RSS, &row[3])?,
            vms: parse_number(COLUMN_VMS, &row[4])?,
            private_mem: parse_number(COLUMN_PRIVATE, &row[5])?,
            mem_percent: parse_number(COLUMN_PERCENT, &row[6])?,
        }))
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, RowError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowError::invalid(field, value))
}

/// Why a row was skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("expected 8 columns, found {0}")]
    ColumnCount(usize),

    #[error("invalid value {value:?} in field {field}")]
    InvalidField { field: &'static str, value: String },
}

impl RowError {
    fn invalid(field: &'static str, value: &str) -> Self {
        RowError::InvalidField {
            field,
            value: value.to_string(),
        }
    }
}

/// The fixed header row for a given display unit
pub fn header_row(unit: MemoryUnit) -> [String; LOG_COLUMNS] {
    [
        COLUMN_TIME.to_string(),
        COLUMN_PID.to_string(),
        COLUMN_NAME.to_string(),
        format!("{}({})", COLUMN_RSS, unit),
        format!("{}({})", COLUMN_VMS, unit),
        format!("{}({})", COLUMN_PRIVATE, unit),
        COLUMN_PERCENT.to_string(),
        COLUMN_REMARK.to_string(),
    ]
}

/// Whether a row is a header line rather than data
pub fn is_header(row: &StringRecord) -> bool {
    row.get(0).map(|first| first == COLUMN_TIME).unwrap_or(false)
}

/// Recover the display unit from a header row (`rss(MB)` → MB)
pub fn unit_from_header(row: &StringRecord) -> Option<MemoryUnit> {
    let column = row.get(3)?;
    let inner = column.strip_prefix(COLUMN_RSS)?.strip_prefix('(')?.strip_suffix(')')?;
    inner.parse().ok()
}
