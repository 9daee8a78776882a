/*!
 * Analysis Engine
 * Session and window statistics per memory dimension
 */

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use super::window::AnalysisWindow;
use crate::core::types::{format_display_seconds, seconds_between};
use crate::core::{round2, MemoryUnit, Pid, Timestamp};
use crate::storage::{LogRecord, MemorySample};

/// Analysis errors; each halts report and chart output for one invocation
#[derive(Error, Debug, Diagnostic)]
pub enum AnalysisError {
    #[error("Log contains no valid samples")]
    #[diagnostic(
        code(analysis::no_valid_data),
        help("Every row was a failure record or could not be parsed.")
    )]
    NoValidData,

    #[error("No samples fall inside the analysis window {window}")]
    #[diagnostic(
        code(analysis::empty_window),
        help("Widen the time range or omit it to analyze the full session.")
    )]
    EmptyWindow { window: String },

    #[error("Invalid time range '{input}': {reason}")]
    #[diagnostic(
        code(analysis::invalid_window),
        help("Use START,END with HH:MM:SS or YYYY-MM-DD HH:MM:SS on each side.")
    )]
    InvalidWindow { input: String, reason: String },

    #[error("Failed to write report {path}: {source}")]
    #[diagnostic(code(analysis::write))]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One memory dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Rss,
    Private,
    Vms,
}

impl Dimension {
    /// Report and chart order
    pub const ALL: [Dimension; 3] = [Dimension::Rss, Dimension::Private, Dimension::Vms];

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Rss => "RSS (resident memory)",
            Dimension::Private => "Private memory",
            Dimension::Vms => "VMS (virtual memory)",
        }
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Dimension::Rss => "RSS",
            Dimension::Private => "Private",
            Dimension::Vms => "VMS",
        }
    }

    fn value(self, sample: &MemorySample) -> f64 {
        match self {
            Dimension::Rss => sample.rss,
            Dimension::Private => sample.private_mem,
            Dimension::Vms => sample.vms,
        }
    }
}

/// Which dimensions are analyzed, reported and plotted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub rss: bool,
    pub private: bool,
    pub vms: bool,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            rss: true,
            private: true,
            vms: true,
        }
    }
}

impl Dimensions {
    pub fn is_enabled(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Rss => self.rss,
            Dimension::Private => self.private,
            Dimension::Vms => self.vms,
        }
    }

    /// Enabled dimensions in report order
    pub fn enabled(&self) -> impl Iterator<Item = Dimension> + '_ {
        Dimension::ALL.into_iter().filter(|d| self.is_enabled(*d))
    }

    pub fn any(&self) -> bool {
        self.rss || self.private || self.vms
    }
}

/// Aggregates for one dimension, rounded to 2 decimals
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DimensionStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    /// (last - first) / minutes; positive means growing
    pub growth_per_minute: f64,
}

impl DimensionStats {
    fn compute(values: &[f64], duration_minutes: f64) -> Self {
        let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
            return Self::default();
        };

        let sum: f64 = values.iter().sum();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let growth = if values.len() > 1 && duration_minutes > 0.0 {
            (last - first) / duration_minutes
        } else {
            0.0
        };

        Self {
            average: round2(sum / values.len() as f64),
            max: round2(max),
            min: round2(min),
            growth_per_minute: round2(growth),
        }
    }
}

/// First/last timestamp and count of a sample set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub first: Timestamp,
    pub last: Timestamp,
    pub samples: usize,
}

impl Extent {
    fn of(samples: &[&MemorySample]) -> Option<Self> {
        let first = samples.first()?.timestamp;
        let last = samples.last()?.timestamp;
        Some(Self {
            first,
            last,
            samples: samples.len(),
        })
    }

    pub fn duration_secs(&self) -> f64 {
        seconds_between(self.first, self.last).max(0.0)
    }
}

/// Statistics for one analyzed session
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub pid: Pid,
    pub process_name: String,
    pub unit: MemoryUnit,
    pub dimensions: Dimensions,
    /// Every valid sample in the log
    pub session: Extent,
    /// Failure rows in the log
    pub failed_samples: usize,
    pub window: AnalysisWindow,
    /// Samples inside the window
    pub windowed: Extent,
    pub rss: DimensionStats,
    pub private: DimensionStats,
    pub vms: DimensionStats,
}

impl AnalysisResult {
    pub fn stats(&self, dimension: Dimension) -> &DimensionStats {
        match dimension {
            Dimension::Rss => &self.rss,
            Dimension::Private => &self.private,
            Dimension::Vms => &self.vms,
        }
    }
}

/// Windowed samples in plotting form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub timestamps: Vec<Timestamp>,
    pub rss: Vec<f64>,
    pub private: Vec<f64>,
    pub vms: Vec<f64>,
}

impl TimeSeries {
    fn from_samples(samples: &[&MemorySample]) -> Self {
        Self {
            timestamps: samples.iter().map(|s| s.timestamp).collect(),
            rss: samples.iter().map(|s| s.rss).collect(),
            private: samples.iter().map(|s| s.private_mem).collect(),
            vms: samples.iter().map(|s| s.vms).collect(),
        }
    }

    pub fn values(&self, dimension: Dimension) -> &[f64] {
        match dimension {
            Dimension::Rss => &self.rss,
            Dimension::Private => &self.private,
            Dimension::Vms => &self.vms,
        }
    }

    /// Minutes since the first point, one per timestamp
    pub fn elapsed_minutes(&self) -> Vec<f64> {
        match self.timestamps.first() {
            Some(&origin) => self
                .timestamps
                .iter()
                .map(|&ts| seconds_between(origin, ts) / 60.0)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Computes statistics over parsed log records
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisEngine {
    dimensions: Dimensions,
}

impl AnalysisEngine {
    pub fn new(dimensions: Dimensions) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Analyze `records` inside `window` (full extent when `None`)
    ///
    /// Records are taken in log order; failure rows only count toward
    /// `failed_samples`.
    pub fn analyze(
        &self,
        records: &[LogRecord],
        unit: MemoryUnit,
        window: Option<AnalysisWindow>,
    ) -> Result<(AnalysisResult, TimeSeries), AnalysisError> {
        let samples: Vec<&MemorySample> = records.iter().filter_map(LogRecord::as_sample).collect();
        let session = Extent::of(&samples).ok_or(AnalysisError::NoValidData)?;
        let failed_samples = records.iter().filter(|r| r.is_failure()).count();

        let window = window.unwrap_or_else(|| AnalysisWindow::covering(session.first, session.last));
        let in_window: Vec<&MemorySample> = samples
            .iter()
            .copied()
            .filter(|s| window.contains(s.timestamp))
            .collect();
        let windowed = Extent::of(&in_window).ok_or_else(|| AnalysisError::EmptyWindow {
            window: format!(
                "{} ~ {}",
                format_display_seconds(window.start()),
                format_display_seconds(window.end())
            ),
        })?;

        let minutes = windowed.duration_secs() / 60.0;
        let stats_for = |dimension: Dimension| {
            if !self.dimensions.is_enabled(dimension) {
                return DimensionStats::default();
            }
            let values: Vec<f64> = in_window.iter().map(|s| dimension.value(s)).collect();
            DimensionStats::compute(&values, minutes)
        };

        // Identity comes from the first record of the log
        let (pid, process_name) = records
            .first()
            .map(|r| (r.pid(), r.process_name().to_string()))
            .unwrap_or_default();

        let result = AnalysisResult {
            pid,
            process_name,
            unit,
            dimensions: self.dimensions,
            session,
            failed_samples,
            window,
            windowed,
            rss: stats_for(Dimension::Rss),
            private: stats_for(Dimension::Private),
            vms: stats_for(Dimension::Vms),
        };
        debug!(
            samples = session.samples,
            windowed = windowed.samples,
            failed = failed_samples,
            "analysis complete"
        );

        Ok((result, TimeSeries::from_samples(&in_window)))
    }
}
