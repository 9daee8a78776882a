/*!
 * Application
 * Monitor and analyze workflows shared by the binary and integration tests
 */

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analysis::{
    write_report, AnalysisEngine, AnalysisError, AnalysisResult, AnalysisWindow, ChartRenderer,
    ChartSpec, Dimensions, SvgChartRenderer,
};
use crate::config::MonitorConfig;
use crate::core::limits::{
    CHART_SUFFIX, REPORT_SUFFIX, STANDALONE_CHART_SUFFIX, STANDALONE_REPORT_SUFFIX,
};
use crate::core::MonitorResult;
use crate::monitoring::{shutdown, ProcessHandle, SamplingScheduler, Sampler, SessionSummary};
use crate::storage::{LogReader, LogStore};

/// Which artifact names to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactNaming {
    /// `{stem}_report.txt` / `{stem}_trend.svg`
    AfterMonitoring,
    /// `{stem}_analysis_report.txt` / `{stem}_analysis_trend.svg`
    Standalone,
}

impl ArtifactNaming {
    fn suffixes(self) -> (&'static str, &'static str) {
        match self {
            Self::AfterMonitoring => (REPORT_SUFFIX, CHART_SUFFIX),
            Self::Standalone => (STANDALONE_REPORT_SUFFIX, STANDALONE_CHART_SUFFIX),
        }
    }
}

/// Inputs for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Session segments, oldest first
    pub logs: Vec<PathBuf>,
    /// Defaults to the directory of the first log
    pub output_dir: Option<PathBuf>,
    /// `START,END`; invalid input falls back to the full extent
    pub time_range: Option<String>,
    pub dimensions: Dimensions,
    pub naming: ArtifactNaming,
}

/// Files produced by an analysis run
#[derive(Debug, Clone)]
pub struct AnalysisArtifacts {
    pub report: PathBuf,
    /// Absent when chart rendering failed
    pub chart: Option<PathBuf>,
    pub result: AnalysisResult,
    /// Rows skipped while parsing
    pub skipped_rows: usize,
}

/// Monitor `handle` until cancelled or the process exits, then analyze the session
///
/// Returns the session summary and, when the log held valid samples, the
/// analysis artifacts. Analysis problems are logged, not returned.
pub async fn run_monitor<H: ProcessHandle>(
    handle: H,
    config: &MonitorConfig,
    cancel: CancellationToken,
) -> MonitorResult<(SessionSummary, Option<AnalysisArtifacts>)> {
    let store = LogStore::open(
        &config.log_dir,
        handle.pid(),
        &handle.name(),
        config.unit,
        config.max_log_size,
    )?;
    let sampler = Sampler::detect(config.unit);
    let mut scheduler = SamplingScheduler::new(handle, sampler, store, config.interval);

    let listener = shutdown::install(cancel.clone());
    let outcome = scheduler.run(cancel.clone()).await;
    // Stop the signal listener whatever the outcome
    cancel.cancel();
    if let Err(e) = listener.await {
        warn!(error = %e, "signal listener task failed");
    }

    let summary = outcome?;
    info!(
        samples = summary.samples,
        failures = summary.failures,
        segments = summary.segments.len(),
        "session complete, generating report"
    );

    let request = AnalysisRequest {
        logs: summary.segments.clone(),
        output_dir: None,
        time_range: None,
        dimensions: config.dimensions,
        naming: ArtifactNaming::AfterMonitoring,
    };
    let artifacts = match analyze_logs(&request) {
        Ok(artifacts) => Some(artifacts),
        Err(e) => {
            warn!(error = %e, "session analysis skipped");
            None
        }
    };
    Ok((summary, artifacts))
}

/// Parse, analyze, and write report and chart for one session
pub fn analyze_logs(request: &AnalysisRequest) -> MonitorResult<AnalysisArtifacts> {
    let parsed = LogReader::read_session(&request.logs)?;
    if parsed.skipped > 0 {
        warn!(skipped = parsed.skipped, "some log rows were skipped");
    }

    let window = request
        .time_range
        .as_deref()
        .and_then(|range| resolve_window(range, &parsed.records));

    let engine = AnalysisEngine::new(request.dimensions);
    let (result, series) = engine.analyze(&parsed.records, parsed.unit, window)?;

    let (report_path, chart_path) = artifact_paths(request)?;
    write_report(&result, &report_path)?;
    info!(path = %report_path.display(), "report written");

    let spec = ChartSpec::from_result(&result);
    let chart = match SvgChartRenderer::default().render(&series, &spec, &chart_path) {
        Ok(()) => {
            info!(path = %chart_path.display(), "chart written");
            Some(chart_path)
        }
        Err(e) => {
            warn!(error = %e, "chart not generated");
            None
        }
    };

    Ok(AnalysisArtifacts {
        report: report_path,
        chart,
        result,
        skipped_rows: parsed.skipped,
    })
}

/// Parse a time range against the date of the first record
fn resolve_window(range: &str, records: &[crate::storage::LogRecord]) -> Option<AnalysisWindow> {
    let reference = records.first()?.timestamp().date();
    match AnalysisWindow::parse(range, reference) {
        Ok(window) => Some(window),
        Err(e) => {
            warn!(error = %e, "invalid time range, analyzing the full session");
            None
        }
    }
}

fn artifact_paths(request: &AnalysisRequest) -> MonitorResult<(PathBuf, PathBuf)> {
    let first = request
        .logs
        .first()
        .ok_or(crate::storage::LogError::NoFiles)?;
    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "memwatch".to_string());
    let dir = match &request.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| AnalysisError::Write {
                path: dir.clone(),
                source,
            })?;
            dir.clone()
        }
        None => first.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let (report_suffix, chart_suffix) = request.naming.suffixes();
    Ok((
        dir.join(format!("{stem}{report_suffix}")),
        dir.join(format!("{stem}{chart_suffix}")),
    ))
}
