/*!
 * Trend Chart
 * SVG line chart of the windowed samples
 */

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use plotters::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::engine::{AnalysisResult, Dimension, Dimensions, TimeSeries};
use crate::core::limits::CHART_SIZE;
use crate::core::MemoryUnit;

/// Chart rendering errors
#[derive(Error, Debug, Diagnostic)]
pub enum ChartError {
    #[error("Nothing to plot: {0}")]
    #[diagnostic(
        code(chart::empty),
        help("Enable at least one memory dimension and make sure the window has samples.")
    )]
    NothingToPlot(&'static str),

    #[error("Failed to render chart {path}: {message}")]
    #[diagnostic(code(chart::render))]
    Render { path: PathBuf, message: String },
}

/// What to draw and how to label it
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub unit: MemoryUnit,
    pub dimensions: Dimensions,
}

impl ChartSpec {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            title: format!(
                "Memory trend - PID {} ({})",
                result.pid, result.process_name
            ),
            unit: result.unit,
            dimensions: result.dimensions,
        }
    }
}

/// Renders a time series to a file
pub trait ChartRenderer {
    fn render(&self, series: &TimeSeries, spec: &ChartSpec, path: &Path) -> Result<(), ChartError>;
}

/// plotters SVG backend renderer
#[derive(Debug, Clone, Copy)]
pub struct SvgChartRenderer {
    size: (u32, u32),
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self { size: CHART_SIZE }
    }
}

impl SvgChartRenderer {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
        }
    }

    fn draw(
        &self,
        series: &TimeSeries,
        spec: &ChartSpec,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let xs = series.elapsed_minutes();
        let x_max = xs.last().copied().unwrap_or(0.0).max(1.0 / 60.0);
        let (y_min, y_max) = value_range(series, spec.dimensions);

        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&spec.title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Elapsed time (minutes)")
            .y_desc(format!("Memory ({})", spec.unit.label()))
            .draw()?;

        for (dimension, color) in [
            (Dimension::Rss, BLUE),
            (Dimension::Private, RED),
            (Dimension::Vms, GREEN),
        ] {
            if !spec.dimensions.is_enabled(dimension) {
                continue;
            }
            let points: Vec<(f64, f64)> = xs
                .iter()
                .copied()
                .zip(series.values(dimension).iter().copied())
                .collect();
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(format!("{} ({})", dimension.short_label(), spec.unit.label()))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, series: &TimeSeries, spec: &ChartSpec, path: &Path) -> Result<(), ChartError> {
        if !spec.dimensions.any() {
            return Err(ChartError::NothingToPlot("all dimensions disabled"));
        }
        if series.is_empty() {
            return Err(ChartError::NothingToPlot("no samples in window"));
        }

        self.draw(series, spec, path).map_err(|e| ChartError::Render {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), points = series.len(), "chart written");
        Ok(())
    }
}

/// Y range over enabled dimensions with 5% headroom
fn value_range(series: &TimeSeries, dimensions: Dimensions) -> (f64, f64) {
    let values = dimensions
        .enabled()
        .flat_map(|d| series.values(d).iter().copied());
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    ((lo - pad).max(0.0), hi + pad)
}
