/*!
 * memwatch Library
 * Process memory sampling, rotating session logs, and trend analysis
 */

pub mod analysis;
pub mod app;
pub mod config;
pub mod core;
pub mod monitoring;
pub mod process;
pub mod storage;

// Re-exports
pub use analysis::{AnalysisEngine, AnalysisResult, AnalysisWindow, Dimensions, TimeSeries};
pub use app::{analyze_logs, run_monitor, AnalysisArtifacts, AnalysisRequest, ArtifactNaming};
pub use config::{ConfigFile, MonitorConfig};
pub use crate::core::{MemoryUnit, MonitorError, MonitorResult, Pid, Timestamp};
pub use monitoring::{init_tracing, SamplingScheduler, Sampler, SessionSummary};
pub use process::SysinfoProcess;
pub use storage::{LogReader, LogRecord, LogStore, MemorySample, SampleFailure};
