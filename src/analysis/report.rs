/*!
 * Report
 * Plain-text summary of one analysis
 */

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::engine::{AnalysisError, AnalysisResult};
use crate::core::types::{format_display_millis, format_display_seconds};

/// Human-readable duration: `1h 2m 3s`, `4m`, `25.5s`, `0s`
///
/// Minutes are shown when non-zero or when hours and seconds surround them;
/// seconds are shown when non-zero or when nothing else is.
pub fn format_duration(total_seconds: f64) -> String {
    let total_seconds = total_seconds.max(0.0);
    let tenths = (total_seconds * 10.0).round() as u64;
    let whole = tenths / 10;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let seconds_tenths = tenths - (hours * 3600 + minutes * 60) * 10;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || (hours > 0 && seconds_tenths > 0) {
        parts.push(format!("{minutes}m"));
    }
    if seconds_tenths > 0 || (hours == 0 && minutes == 0) {
        if seconds_tenths % 10 == 0 {
            parts.push(format!("{}s", seconds_tenths / 10));
        } else {
            parts.push(format!("{}.{}s", seconds_tenths / 10, seconds_tenths % 10));
        }
    }
    parts.join(" ")
}

/// Render the full report text
pub fn render_report(result: &AnalysisResult) -> String {
    let unit = result.unit.label();
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "===== Process Memory Analysis Report =====");
    let _ = writeln!(out, "Process: PID={} | Name={}", result.pid, result.process_name);
    let _ = writeln!(out);

    let _ = writeln!(out, "[Monitoring period (all samples)]");
    let _ = writeln!(
        out,
        "Period: {} ~ {}",
        format_display_millis(result.session.first),
        format_display_millis(result.session.last)
    );
    let _ = writeln!(
        out,
        "Duration: {} | Samples: {} | Failed samples: {}",
        format_duration(result.session.duration_secs()),
        result.session.samples,
        result.failed_samples
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "[Analysis window]");
    let _ = writeln!(
        out,
        "Window: {} ~ {} (end exclusive)",
        format_display_seconds(result.window.start()),
        format_display_seconds(result.window.end())
    );
    let _ = writeln!(
        out,
        "Duration: {} | Samples in window: {}",
        format_duration(result.windowed.duration_secs()),
        result.windowed.samples
    );

    for dimension in result.dimensions.enabled() {
        let stats = result.stats(dimension);
        let _ = writeln!(out);
        let _ = writeln!(out, "[{}]", dimension.label());
        let _ = writeln!(
            out,
            "Average: {:.2} {unit} | Max: {:.2} {unit} | Min: {:.2} {unit}",
            stats.average, stats.max, stats.min
        );
        let _ = writeln!(
            out,
            "Growth rate: {:.2} {unit}/min (positive = growing, negative = shrinking)",
            stats.growth_per_minute
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "===== End of report =====");
    out
}

/// Render and write the report to `path`
pub fn write_report(result: &AnalysisResult, path: &Path) -> Result<(), AnalysisError> {
    fs::write(path, render_report(result)).map_err(|source| AnalysisError::Write {
        path: path.to_path_buf(),
        source,
    })
}
