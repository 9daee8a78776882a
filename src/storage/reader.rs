/*!
 * Log Reader
 * Tolerant parsing of persisted session logs
 *
 * A crash mid-write can truncate the last line, so rows that fail to parse
 * are skipped with a warning instead of aborting the read.
 */

use super::record::{is_header, unit_from_header, LogRecord, MemorySample};
use crate::core::{MemoryUnit, Timestamp};
use miette::Diagnostic;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Log reading errors (fatal for the read; per-row problems are skipped)
#[derive(Error, Debug, Diagnostic)]
pub enum LogError {
    #[error("Failed to read log file {path}: {source}")]
    #[diagnostic(
        code(log::io),
        help("Check that the log file exists and is readable.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No log files given")]
    #[diagnostic(code(log::no_files))]
    NoFiles,
}

/// Records recovered from one or more log segments
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLog {
    pub records: Vec<LogRecord>,
    /// Display unit declared by the header (MB when no header was found)
    pub unit: MemoryUnit,
    /// Rows that could not be parsed
    pub skipped: usize,
    pub sources: Vec<PathBuf>,
}

impl ParsedLog {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            unit: MemoryUnit::default(),
            skipped: 0,
            sources: Vec::new(),
        }
    }

    pub fn samples(&self) -> impl Iterator<Item = &MemorySample> {
        self.records.iter().filter_map(LogRecord::as_sample)
    }

    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_failure()).count()
    }
}

/// Reads session logs back into typed records
pub struct LogReader;

impl LogReader {
    /// Read a single log file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<ParsedLog, LogError> {
        Self::read_session(&[path])
    }

    /// Read every segment of a session
    ///
    /// Segments are merged in chronological order of their first record,
    /// whatever order the paths were given in. Segments without records keep
    /// their relative position at the end.
    pub fn read_session<P: AsRef<Path>>(paths: &[P]) -> Result<ParsedLog, LogError> {
        if paths.is_empty() {
            return Err(LogError::NoFiles);
        }

        let mut segments = Vec::with_capacity(paths.len());
        let mut unit = None;
        let mut skipped = 0;
        for path in paths {
            segments.push(read_segment(path.as_ref(), &mut unit, &mut skipped)?);
        }

        let given: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
        segments.sort_by_key(|s| (s.first_timestamp().is_none(), s.first_timestamp()));
        if segments.iter().map(|s| &s.path).ne(given.iter()) {
            warn!(
                given = ?given,
                "log segments were out of chronological order, reading oldest first"
            );
        }

        let mut parsed = ParsedLog::empty();
        parsed.unit = unit.unwrap_or_default();
        parsed.skipped = skipped;
        for segment in segments {
            parsed.records.extend(segment.records);
            parsed.sources.push(segment.path);
        }

        debug!(
            segments = parsed.sources.len(),
            records = parsed.records.len(),
            skipped = parsed.skipped,
            "log read complete"
        );
        Ok(parsed)
    }
}

/// Records from one file, before segments are ordered
struct Segment {
    path: PathBuf,
    records: Vec<LogRecord>,
}

impl Segment {
    fn first_timestamp(&self) -> Option<Timestamp> {
        self.records.first().map(LogRecord::timestamp)
    }
}

fn read_segment(
    path: &Path,
    unit: &mut Option<MemoryUnit>,
    skipped: &mut usize,
) -> Result<Segment, LogError> {
    let file = File::open(path).map_err(|source| LogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(file));
    let mut row = csv::StringRecord::new();
    let mut records = Vec::new();

    loop {
        match reader.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                if let csv::ErrorKind::Io(io_err) = e.kind() {
                    return Err(LogError::Io {
                        path: path.to_path_buf(),
                        source: io::Error::new(io_err.kind(), io_err.to_string()),
                    });
                }
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                warn!(path = %path.display(), line, error = %e, "skipping unreadable log row");
                *skipped += 1;
                continue;
            }
        }

        if is_header(&row) {
            if unit.is_none() {
                *unit = unit_from_header(&row);
            }
            continue;
        }

        match LogRecord::from_row(&row) {
            Ok(record) => records.push(record),
            Err(e) => {
                let line = row.position().map(|p| p.line()).unwrap_or_default();
                warn!(path = %path.display(), line, error = %e, "skipping malformed log row");
                *skipped += 1;
            }
        }
    }

    Ok(Segment {
        path: path.to_path_buf(),
        records,
    })
}
