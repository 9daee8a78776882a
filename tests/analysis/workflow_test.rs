/*!
 * Analysis Workflow Tests
 * Log files in, report and chart files out
 */

use memwatch::analysis::Dimensions;
use memwatch::core::MemoryUnit;
use memwatch::storage::{LogRecord, LogStore, MemorySample};
use memwatch::{analyze_logs, AnalysisRequest, ArtifactNaming, MonitorError};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use time::macros::datetime;
use time::Duration;

fn write_session(dir: &TempDir) -> Vec<PathBuf> {
    let path = dir.path().join("mem_monitor_leaky_1234_20240501-000000.log");
    let mut store = LogStore::open_path(path, MemoryUnit::MB, 1024 * 1024).unwrap();
    let origin = datetime!(2024-05-01 00:00:00.250);
    for i in 0..=10 {
        store
            .append(&LogRecord::Sample(MemorySample {
                timestamp: origin + Duration::seconds(i * 10),
                pid: 1234,
                process_name: "leaky".to_string(),
                rss: (i * 10) as f64,
                vms: 500.0,
                private_mem: 5.0,
                mem_percent: 0.5,
            }))
            .unwrap();
    }
    let segments = store.segments().to_vec();
    store.close().unwrap();
    segments
}

fn request(logs: Vec<PathBuf>, time_range: Option<&str>) -> AnalysisRequest {
    AnalysisRequest {
        logs,
        output_dir: None,
        time_range: time_range.map(str::to_string),
        dimensions: Dimensions::default(),
        naming: ArtifactNaming::Standalone,
    }
}

#[test]
fn test_standalone_artifacts_are_written() {
    let temp = TempDir::new().unwrap();
    let logs = write_session(&temp);

    let artifacts = analyze_logs(&request(logs, Some("00:00:12,00:00:45"))).unwrap();

    assert_eq!(
        artifacts.report.file_name().unwrap().to_string_lossy(),
        "mem_monitor_leaky_1234_20240501-000000_analysis_report.txt"
    );
    assert_eq!(artifacts.result.windowed.samples, 3);

    let text = fs::read_to_string(&artifacts.report).unwrap();
    assert!(text.contains("Samples in window: 3"));

    let chart = artifacts.chart.expect("chart");
    assert!(chart.to_string_lossy().ends_with("_analysis_trend.svg"));
    assert!(chart.exists());
}

#[test]
fn test_bad_time_range_falls_back_to_full_session() {
    let temp = TempDir::new().unwrap();
    let logs = write_session(&temp);

    let artifacts = analyze_logs(&request(logs, Some("noon,later"))).unwrap();
    assert_eq!(artifacts.result.windowed.samples, 11);
}

#[test]
fn test_empty_window_is_reported() {
    let temp = TempDir::new().unwrap();
    let logs = write_session(&temp);

    let err = analyze_logs(&request(logs, Some("05:00:00,06:00:00"))).unwrap_err();
    assert!(matches!(err, MonitorError::Analysis(_)));
}

#[test]
fn test_output_dir_is_created() {
    let temp = TempDir::new().unwrap();
    let logs = write_session(&temp);
    let out = temp.path().join("reports");

    let mut req = request(logs, None);
    req.output_dir = Some(out.clone());
    req.naming = ArtifactNaming::AfterMonitoring;

    let artifacts = analyze_logs(&req).unwrap();
    assert_eq!(artifacts.report.parent().unwrap(), out.as_path());
    assert!(artifacts
        .report
        .to_string_lossy()
        .ends_with("20240501-000000_report.txt"));
}
