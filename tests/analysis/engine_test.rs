/*!
 * Analysis Engine Tests
 */

use memwatch::analysis::{render_report, AnalysisEngine, AnalysisWindow, Dimensions};
use memwatch::core::{MemoryUnit, Timestamp};
use memwatch::storage::{LogRecord, MemorySample, SampleFailure};
use pretty_assertions::assert_eq;
use time::macros::{date, datetime};
use time::Duration;

fn record(ts: Timestamp, rss: f64) -> LogRecord {
    LogRecord::Sample(MemorySample {
        timestamp: ts,
        pid: 1234,
        process_name: "leaky".to_string(),
        rss,
        vms: rss * 2.0,
        private_mem: rss - 20.0,
        mem_percent: 1.0,
    })
}

#[test]
fn test_growth_over_four_minutes() {
    let origin = datetime!(2024-05-01 12:00:00);
    let records: Vec<LogRecord> = [100.0, 110.0, 105.0, 120.0, 130.0]
        .iter()
        .enumerate()
        .map(|(i, &rss)| record(origin + Duration::minutes(i as i64), rss))
        .collect();

    let (result, series) = AnalysisEngine::default()
        .analyze(&records, MemoryUnit::MB, None)
        .unwrap();

    assert_eq!(result.rss.average, 113.0);
    assert_eq!(result.rss.max, 130.0);
    assert_eq!(result.rss.min, 100.0);
    assert_eq!(result.rss.growth_per_minute, 7.5);
    assert_eq!(result.vms.growth_per_minute, 15.0);
    assert_eq!(result.private.average, 93.0);

    assert_eq!(result.session.samples, 5);
    assert_eq!(result.windowed.samples, 5);
    assert_eq!(result.session.duration_secs(), 240.0);
    assert_eq!(result.window.start(), origin);
    assert_eq!(result.window.end(), datetime!(2024-05-01 12:04:01));
    assert_eq!(series.len(), 5);
}

#[test]
fn test_time_window_selects_half_open_range() {
    let origin = datetime!(2024-05-01 00:00:00);
    let records: Vec<LogRecord> = (0..=10)
        .map(|i| record(origin + Duration::seconds(i * 10), (i * 10) as f64))
        .collect();

    let window = AnalysisWindow::parse("00:00:12,00:00:45", date!(2024-05-01)).unwrap();
    assert_eq!(window.end(), datetime!(2024-05-01 00:00:46));

    let (result, series) = AnalysisEngine::default()
        .analyze(&records, MemoryUnit::MB, Some(window))
        .unwrap();

    assert_eq!(series.rss, vec![20.0, 30.0, 40.0]);
    assert_eq!(result.windowed.samples, 3);
    assert_eq!(result.session.samples, 11);
    assert_eq!(result.rss.average, 30.0);
    // 20 -> 40 over 20 seconds
    assert_eq!(result.rss.growth_per_minute, 60.0);
}

#[test]
fn test_failures_are_counted_not_analyzed() {
    let origin = datetime!(2024-05-01 12:00:00);
    let records = vec![
        record(origin, 100.0),
        LogRecord::Failure(SampleFailure {
            timestamp: origin + Duration::seconds(5),
            pid: 1234,
            process_name: "leaky".to_string(),
            reason: "sample failed: timeout".to_string(),
        }),
        record(origin + Duration::seconds(60), 160.0),
    ];

    let (result, _) = AnalysisEngine::default()
        .analyze(&records, MemoryUnit::MB, None)
        .unwrap();
    assert_eq!(result.failed_samples, 1);
    assert_eq!(result.session.samples, 2);
    assert_eq!(result.rss.growth_per_minute, 60.0);
}

#[test]
fn test_report_sections_follow_enabled_dimensions() {
    let origin = datetime!(2024-05-01 12:00:00);
    let records: Vec<LogRecord> = [100.0, 110.0, 105.0, 120.0, 130.0]
        .iter()
        .enumerate()
        .map(|(i, &rss)| record(origin + Duration::minutes(i as i64), rss))
        .collect();

    let engine = AnalysisEngine::new(Dimensions {
        rss: true,
        private: false,
        vms: true,
    });
    let (result, _) = engine.analyze(&records, MemoryUnit::MB, None).unwrap();
    let report = render_report(&result);

    assert!(report.contains("Process: PID=1234 | Name=leaky"));
    assert!(report.contains("Duration: 4m | Samples: 5 | Failed samples: 0"));
    assert!(report.contains("Average: 113.00 MB | Max: 130.00 MB | Min: 100.00 MB"));
    assert!(report.contains("Growth rate: 7.50 MB/min (positive = growing, negative = shrinking)"));
    assert!(!report.contains("[Private memory]"));

    let rss_at = report.find("[RSS (resident memory)]").unwrap();
    let vms_at = report.find("[VMS (virtual memory)]").unwrap();
    let window_at = report.find("[Analysis window]").unwrap();
    let period_at = report.find("[Monitoring period (all samples)]").unwrap();
    assert!(period_at < window_at && window_at < rss_at && rss_at < vms_at);
}
