/*!
 * Limits and Defaults
 *
 * Centralized location for defaults, thresholds, and naming constants.
 * Organized by domain for maintainability and discoverability.
 */

use std::time::Duration;

// =============================================================================
// SAMPLING
// =============================================================================

/// Default sampling interval (5s)
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Shortest accepted sampling interval
pub const MIN_INTERVAL_SECS: u64 = 1;

/// Pause after a recoverable tick error before the loop resumes
pub const TICK_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Failure detail is truncated to this many characters in log remarks
pub const FAILURE_DETAIL_MAX_CHARS: usize = 50;

// =============================================================================
// LOG STORAGE
// =============================================================================

/// Default log directory, relative to the working directory
pub const DEFAULT_LOG_DIR: &str = "mem_monitor_logs";

/// Default size threshold for rotation (100MB)
pub const DEFAULT_MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Log file name prefix
pub const LOG_FILE_PREFIX: &str = "mem_monitor";

/// Log file extension (without the dot)
pub const LOG_FILE_EXTENSION: &str = "log";

/// Number of columns in every log row
pub const LOG_COLUMNS: usize = 8;

// =============================================================================
// ARTIFACTS
// =============================================================================

/// Report suffix after a monitoring run
pub const REPORT_SUFFIX: &str = "_report.txt";

/// Chart suffix after a monitoring run
pub const CHART_SUFFIX: &str = "_trend.svg";

/// Report suffix for the standalone analyzer
pub const STANDALONE_REPORT_SUFFIX: &str = "_analysis_report.txt";

/// Chart suffix for the standalone analyzer
pub const STANDALONE_CHART_SUFFIX: &str = "_analysis_trend.svg";

/// Chart canvas size in pixels
pub const CHART_SIZE: (u32, u32) = (1200, 600);
