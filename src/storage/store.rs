/*!
 * Log Store
 * Append-only CSV log with flush-per-record and size-based rotation
 */

use super::record::{header_row, LogRecord};
use super::rotation::{next_log_path, session_file_name};
use crate::core::types::now_local;
use crate::core::{MemoryUnit, Pid};
use miette::Diagnostic;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Log storage errors
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    #[error("Failed to create log directory {path}: {source}")]
    #[diagnostic(
        code(store::create_dir),
        help("Check that the parent directory exists and is writable.")
    )]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open log file {path}: {source}")]
    #[diagnostic(
        code(store::open),
        help("Monitoring cannot continue without durable storage. Check permissions and disk space.")
    )]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write log file {path}: {source}")]
    #[diagnostic(
        code(store::write),
        help("The write was retried once. Check disk space and that the file was not removed.")
    )]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to rotate log file {path}: {source}")]
    #[diagnostic(
        code(store::rotate),
        help("Logging continues in the current file. Check permissions on the log directory.")
    )]
    Rotate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode log record: {0}")]
    #[diagnostic(code(store::encode))]
    Encode(String),

    #[error("Log store is closed")]
    #[diagnostic(code(store::closed), help("The session has already stopped."))]
    Closed,
}

/// Rotating log for one monitoring session
///
/// The store exclusively owns its file handle. The handle is released exactly
/// once: on [`close`](Self::close), on a rotation swap, or on drop.
pub struct LogStore {
    current_path: PathBuf,
    file: Option<File>,
    unit: MemoryUnit,
    max_bytes: u64,
    segments: Vec<PathBuf>,
    records_written: u64,
}

impl LogStore {
    /// Open a new session log in `directory`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(
        directory: P,
        pid: Pid,
        process_name: &str,
        unit: MemoryUnit,
        max_bytes: u64,
    ) -> Result<Self, StoreError> {
        let directory = directory.as_ref();
        if !directory.exists() {
            fs::create_dir_all(directory).map_err(|source| StoreError::CreateDir {
                path: directory.to_path_buf(),
                source,
            })?;
            info!(path = %directory.display(), "log directory created");
        }

        let path = directory.join(session_file_name(process_name, pid, now_local()));
        Self::open_path(path, unit, max_bytes)
    }

    /// Open (or continue) a log at an explicit path
    pub fn open_path(path: PathBuf, unit: MemoryUnit, max_bytes: u64) -> Result<Self, StoreError> {
        let file = open_segment(&path, unit).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), max_bytes, "log file opened");

        Ok(Self {
            segments: vec![path.clone()],
            current_path: path,
            file: Some(file),
            unit,
            max_bytes,
            records_written: 0,
        })
    }

    /// Append one record and push it to disk
    ///
    /// A failed write is retried once; a second failure is returned.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), StoreError> {
        let line = encode_row(&record.to_row())?;
        let file = self.file.as_mut().ok_or(StoreError::Closed)?;
        let write_error = |source: io::Error| StoreError::Write {
            path: self.current_path.clone(),
            source,
        };
        let row_start = file.metadata().map_err(write_error)?.len();

        if let Err(first) = write_synced(file, &line) {
            warn!(
                path = %self.current_path.display(),
                error = %first,
                "log append failed, retrying once"
            );
            // Drop any partial line so the retry starts on a row boundary
            file.set_len(row_start).map_err(write_error)?;
            if let Err(second) = write_synced(file, &line) {
                if let Err(e) = file.set_len(row_start) {
                    warn!(path = %self.current_path.display(), error = %e, "partial log row left in place");
                }
                return Err(write_error(second));
            }
        }

        self.records_written += 1;
        Ok(())
    }

    /// Switch to the next segment once the current file reaches the threshold
    ///
    /// Returns the new path when a rotation happened. The successor is opened
    /// before the current handle is released, so a failure leaves logging in
    /// the current file.
    pub fn rotate_if_needed(&mut self) -> Result<Option<PathBuf>, StoreError> {
        let file = self.file.as_ref().ok_or(StoreError::Closed)?;
        let size = file
            .metadata()
            .map_err(|source| StoreError::Rotate {
                path: self.current_path.clone(),
                source,
            })?
            .len();

        if size < self.max_bytes {
            return Ok(None);
        }

        let next = next_log_path(&self.current_path);
        info!(
            path = %self.current_path.display(),
            size,
            max_bytes = self.max_bytes,
            "log file reached size limit, rotating"
        );
        let successor = open_segment(&next, self.unit).map_err(|source| StoreError::Rotate {
            path: next.clone(),
            source,
        })?;

        // Old handle is dropped here, exactly once
        drop(self.file.replace(successor));
        self.current_path = next.clone();
        self.segments.push(next.clone());

        info!(path = %next.display(), "new log file");
        Ok(Some(next))
    }

    /// Release the file handle
    ///
    /// Returns `Ok(true)` when this call closed the file and `Ok(false)` if it
    /// was already closed.
    pub fn close(&mut self) -> Result<bool, StoreError> {
        match self.file.take() {
            Some(file) => {
                let synced = file.sync_all();
                drop(file);
                debug!(
                    path = %self.current_path.display(),
                    records = self.records_written,
                    "log file closed"
                );
                synced.map_err(|source| StoreError::Write {
                    path: self.current_path.clone(),
                    source,
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Path currently being written
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Every segment of this session, oldest first
    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn unit(&self) -> MemoryUnit {
        self.unit
    }
}

impl Drop for LogStore {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(e) = self.close() {
                error!(path = %self.current_path.display(), error = %e, "log close on drop failed");
            }
        }
    }
}

/// Open a segment for appending; writes the header only into an empty file
fn open_segment(path: &Path, unit: MemoryUnit) -> io::Result<File> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        let header = encode_row(&header_row(unit))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        write_synced(&mut file, &header)?;
    }
    Ok(file)
}

fn write_synced(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}

/// Render one CSV line, quoting as needed
fn encode_row(row: &[String]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(128));
    writer
        .write_record(row)
        .map_err(|e| StoreError::Encode(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| StoreError::Encode(e.into_error().to_string()))
}
