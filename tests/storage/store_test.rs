/*!
 * Log Store Tests
 */

use memwatch::core::MemoryUnit;
use memwatch::storage::{next_log_path, LogReader, LogRecord, LogStore, MemorySample};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use time::macros::datetime;
use time::Duration;

const HEADER_PREFIX: &str = "sample_time(ISO8601),pid,process_name,rss(MB)";

fn sample(i: i64) -> LogRecord {
    LogRecord::Sample(MemorySample {
        timestamp: datetime!(2024-05-01 12:00:00.125) + Duration::seconds(5 * i),
        pid: 4242,
        process_name: "worker".to_string(),
        rss: 100.0 + i as f64,
        vms: 2048.5,
        private_mem: 64.25,
        mem_percent: 1.23,
    })
}

fn count_headers(text: &str) -> usize {
    text.lines().filter(|l| l.starts_with("sample_time")).count()
}

#[test]
fn test_open_creates_directory_and_header() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("logs");

    let store = LogStore::open(&dir, 4242, "my/worker", MemoryUnit::MB, 1024 * 1024).unwrap();
    let path = store.current_path().to_path_buf();
    drop(store);

    assert!(dir.is_dir());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("mem_monitor_my_worker_4242_"));
    assert!(name.ends_with(".log"));

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(HEADER_PREFIX));
    assert_eq!(count_headers(&text), 1);
}

#[test]
fn test_reopening_nonempty_file_does_not_repeat_header() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("session.log");

    let mut store = LogStore::open_path(path.clone(), MemoryUnit::MB, 1024 * 1024).unwrap();
    store.append(&sample(0)).unwrap();
    store.close().unwrap();

    let mut again = LogStore::open_path(path.clone(), MemoryUnit::MB, 1024 * 1024).unwrap();
    again.append(&sample(1)).unwrap();
    again.close().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(count_headers(&text), 1);
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_rotation_increments_suffix_and_writes_header() {
    let temp = TempDir::new().unwrap();
    let mut store = LogStore::open(temp.path(), 7, "svc", MemoryUnit::MB, 1).unwrap();
    let first = store.current_path().to_path_buf();

    store.append(&sample(0)).unwrap();
    let second = store.rotate_if_needed().unwrap().expect("rotation");
    assert_eq!(second, next_log_path(&first));
    assert!(second.to_string_lossy().ends_with("_1.log"));

    store.append(&sample(1)).unwrap();
    let third = store.rotate_if_needed().unwrap().expect("rotation");
    assert!(third.to_string_lossy().ends_with("_2.log"));

    assert_eq!(store.segments(), &[first.clone(), second.clone(), third.clone()]);
    store.close().unwrap();

    for segment in [&first, &second, &third] {
        let text = fs::read_to_string(segment).unwrap();
        assert!(text.starts_with(HEADER_PREFIX), "{} lacks header", segment.display());
        assert_eq!(count_headers(&text), 1);
    }
}

#[test]
fn test_no_rotation_below_threshold() {
    let temp = TempDir::new().unwrap();
    let mut store = LogStore::open(temp.path(), 7, "svc", MemoryUnit::MB, 1024 * 1024).unwrap();
    store.append(&sample(0)).unwrap();
    assert_eq!(store.rotate_if_needed().unwrap(), None);
    assert_eq!(store.segments().len(), 1);
}

#[test]
fn test_close_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut store = LogStore::open(temp.path(), 7, "svc", MemoryUnit::MB, 1024).unwrap();

    assert!(store.is_open());
    assert!(store.close().unwrap());
    assert!(!store.close().unwrap());
    assert!(!store.is_open());
    assert!(store.append(&sample(0)).is_err());
}

#[test]
fn test_round_trip_preserves_records() {
    let temp = TempDir::new().unwrap();
    let mut store = LogStore::open(temp.path(), 4242, "worker", MemoryUnit::MB, 1024 * 1024).unwrap();

    let written: Vec<LogRecord> = (0..25).map(sample).collect();
    for record in &written {
        store.append(record).unwrap();
    }
    assert_eq!(store.records_written(), 25);
    let segments = store.segments().to_vec();
    store.close().unwrap();

    let parsed = LogReader::read_session(&segments).unwrap();
    assert_eq!(parsed.records, written);
    assert_eq!(parsed.skipped, 0);
    assert_eq!(parsed.unit, MemoryUnit::MB);
}

#[test]
fn test_rotated_session_reads_in_order() {
    let temp = TempDir::new().unwrap();
    // Small threshold: every append after the header triggers a rotation
    let mut store = LogStore::open(temp.path(), 4242, "worker", MemoryUnit::KB, 64).unwrap();

    let written: Vec<LogRecord> = (0..6).map(sample).collect();
    for record in &written {
        store.append(record).unwrap();
        store.rotate_if_needed().unwrap();
    }
    let segments = store.segments().to_vec();
    store.close().unwrap();
    assert!(segments.len() > 1);

    let parsed = LogReader::read_session(&segments).unwrap();
    assert_eq!(parsed.records, written);
    assert_eq!(parsed.unit, MemoryUnit::KB);
}
