/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

// Re-export component errors so callers can match on them from one place
pub use crate::analysis::{AnalysisError, ChartError};
pub use crate::config::ConfigError;
pub use crate::monitoring::{SampleError, SchedulerError};
pub use crate::process::DiscoveryError;
pub use crate::storage::{LogError, StoreError};

/// Unified error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum MonitorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Chart(#[from] ChartError),

    #[error("Runtime error: {0}")]
    #[diagnostic(
        code(memwatch::runtime),
        help("The async runtime could not be started. Check system resources.")
    )]
    Runtime(#[from] std::io::Error),
}

/// Result type for top-level operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Truncate diagnostic text to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
