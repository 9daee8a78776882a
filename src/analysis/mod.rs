/*!
 * Analysis
 * Windowed statistics, text reports, and trend charts over session logs
 */

pub mod chart;
mod engine;
mod report;
mod window;

pub use chart::{ChartError, ChartRenderer, ChartSpec, SvgChartRenderer};
pub use engine::{
    AnalysisEngine, AnalysisError, AnalysisResult, Dimension, DimensionStats, Dimensions, Extent,
    TimeSeries,
};
pub use report::{format_duration, render_report, write_report};
pub use window::AnalysisWindow;
