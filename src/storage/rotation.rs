/*!
 * Log Naming and Rotation
 *
 * Pure naming functions, kept apart from file I/O:
 * - Session file names: `mem_monitor_{name}_{pid}_{YYYYmmdd-HHMMSS}.log`
 * - Rotation successors: `_1`, `_2`, ... appended to the stem
 */

use crate::core::limits::{LOG_FILE_EXTENSION, LOG_FILE_PREFIX};
use crate::core::types::format_session_token;
use crate::core::{Pid, Timestamp};
use std::path::{Path, PathBuf};

/// Replace characters that would break out of the log directory or are
/// invalid on common filesystems
pub fn sanitize_process_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

/// File name for the first segment of a session
///
/// The session token uses a dash between date and time so the trailing
/// token is never mistaken for a numeric rotation suffix.
pub fn session_file_name(process_name: &str, pid: Pid, started: Timestamp) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        LOG_FILE_PREFIX,
        sanitize_process_name(process_name),
        pid,
        format_session_token(started),
        LOG_FILE_EXTENSION
    )
}

/// Name of the segment that follows `current`
///
/// - `a_b.log`   → `a_b_1.log` (trailing token not numeric)
/// - `a_b_1.log` → `a_b_2.log`
/// - `a.log`     → `a_1.log`   (no underscore at all)
/// - `a_7`       → `a_8`       (no extension)
/// - a numeric suffix too large to increment is treated as non-numeric
pub fn next_log_name(current: &str) -> String {
    let (stem, extension) = match current.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (current, None),
    };

    let next_stem = stem
        .rsplit_once('_')
        .and_then(|(base, suffix)| {
            numeric_suffix(suffix)
                .and_then(|n| n.checked_add(1))
                .map(|next| format!("{}_{}", base, next))
        })
        .unwrap_or_else(|| format!("{}_1", stem));

    match extension {
        Some(ext) => format!("{}.{}", next_stem, ext),
        None => next_stem,
    }
}

/// Path of the segment that follows `current`, in the same directory
pub fn next_log_path(current: &Path) -> PathBuf {
    let name = current
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    current.with_file_name(next_log_name(&name))
}

fn numeric_suffix(token: &str) -> Option<u64> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}
