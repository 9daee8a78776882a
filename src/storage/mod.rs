/*!
 * Storage
 * Session log records, rotating store, and tolerant reader
 */

mod reader;
mod record;
mod rotation;
mod store;

pub use reader::{LogError, LogReader, ParsedLog};
pub use record::{header_row, LogRecord, MemorySample, RowError, SampleFailure};
pub use rotation::{next_log_name, next_log_path, sanitize_process_name, session_file_name};
pub use store::{LogStore, StoreError};
