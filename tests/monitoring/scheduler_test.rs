/*!
 * Sampling Scheduler Tests
 * Driven on a paused tokio clock with a scripted process
 */

use memwatch::config::MonitorConfig;
use memwatch::core::{MemoryUnit, Pid};
use memwatch::monitoring::{
    PrivateMemoryProbe, ProcessHandle, ProcessMemory, SampleError, Sampler, SamplingScheduler,
    SchedulerError, SchedulerState, StopReason,
};
use memwatch::run_monitor;
use memwatch::storage::{next_log_path, LogReader, LogRecord, LogStore};
use pretty_assertions::assert_eq;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const MB: u64 = 1024 * 1024;

/// Scripted process: alive for a fixed number of liveness checks
struct FakeProcess {
    pid: Pid,
    alive_checks: Option<usize>,
    checks: usize,
    reads: usize,
    fail_every: Option<usize>,
}

impl FakeProcess {
    fn immortal() -> Self {
        Self {
            pid: 4321,
            alive_checks: None,
            checks: 0,
            reads: 0,
            fail_every: None,
        }
    }

    fn alive_for(checks: usize) -> Self {
        Self {
            alive_checks: Some(checks),
            ..Self::immortal()
        }
    }
}

impl ProcessHandle for FakeProcess {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn name(&self) -> String {
        "fake".to_string()
    }

    fn is_alive(&mut self) -> bool {
        self.checks += 1;
        self.alive_checks.map_or(true, |limit| self.checks <= limit)
    }

    fn read_memory(&mut self, _probe: PrivateMemoryProbe) -> Result<ProcessMemory, SampleError> {
        self.reads += 1;
        if let Some(every) = self.fail_every {
            if self.reads % every == 0 {
                return Err(SampleError::transient("counter read timed out"));
            }
        }
        Ok(ProcessMemory {
            rss: (100 + self.reads as u64) * MB,
            vms: 1024 * MB,
            unique: Some(50 * MB),
            shared: None,
        })
    }

    fn total_system_memory(&mut self) -> Result<u64, SampleError> {
        Ok(16 * 1024 * MB)
    }
}

fn scheduler(dir: &TempDir, handle: FakeProcess, interval_secs: u64) -> SamplingScheduler<FakeProcess> {
    let store = LogStore::open(dir.path(), handle.pid, "fake", MemoryUnit::MB, 10 * MB).unwrap();
    let sampler = Sampler::new(MemoryUnit::MB, PrivateMemoryProbe::UniqueSet);
    SamplingScheduler::new(handle, sampler, store, Duration::from_secs(interval_secs))
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_wait_stops_promptly() {
    let dir = TempDir::new().unwrap();
    let mut scheduler = scheduler(&dir, FakeProcess::immortal(), 5);
    let token = CancellationToken::new();
    let started = Instant::now();

    let task = {
        let token = token.clone();
        tokio::spawn(async move {
            let outcome = scheduler.run(token).await;
            (scheduler, outcome)
        })
    };

    // Ticks at 0s, 5s, 10s; cancel while waiting for the 15s tick
    tokio::time::sleep(Duration::from_secs(12)).await;
    token.cancel();
    let (mut scheduler, outcome) = task.await.unwrap();
    let summary = outcome.unwrap();

    assert!(started.elapsed() < Duration::from_secs(15));
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.failures, 0);
    assert_eq!(summary.overruns, 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped(StopReason::Cancelled));

    // Already closed by the scheduler; a second close is a no-op
    assert!(!scheduler.store().is_open());
    assert!(!scheduler.store_mut().close().unwrap());

    let parsed = LogReader::read_session(&summary.segments).unwrap();
    assert_eq!(parsed.samples().count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_samples_are_one_interval_apart() {
    let dir = TempDir::new().unwrap();
    let mut scheduler = scheduler(&dir, FakeProcess::immortal(), 2);
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(9_500)).await;
            token.cancel();
        })
    };

    let summary = scheduler.run(token).await.unwrap();
    canceller.await.unwrap();

    // 0, 2, 4, 6, 8
    assert_eq!(summary.samples, 5);
}

#[tokio::test(start_paused = true)]
async fn test_process_exit_stops_session() {
    let dir = TempDir::new().unwrap();
    // One check at start, then one per tick: two ticks sample, the third sees exit
    let mut scheduler = scheduler(&dir, FakeProcess::alive_for(3), 1);

    let summary = scheduler.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::ProcessTerminated);
    assert_eq!(summary.samples, 2);
    assert_eq!(
        scheduler.state(),
        SchedulerState::Stopped(StopReason::ProcessTerminated)
    );
    assert!(!scheduler.store().is_open());
}

#[tokio::test(start_paused = true)]
async fn test_dead_process_never_starts() {
    let dir = TempDir::new().unwrap();
    let mut scheduler = scheduler(&dir, FakeProcess::alive_for(0), 1);

    let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotRunning { pid: 4321 }));
    assert!(!scheduler.store().is_open());
}

#[tokio::test(start_paused = true)]
async fn test_stopped_scheduler_cannot_restart() {
    let dir = TempDir::new().unwrap();
    let mut scheduler = scheduler(&dir, FakeProcess::alive_for(2), 1);
    scheduler.run(CancellationToken::new()).await.unwrap();

    let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyStarted { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_sample_failures_become_log_rows() {
    let dir = TempDir::new().unwrap();
    let handle = FakeProcess {
        fail_every: Some(2),
        ..FakeProcess::alive_for(5)
    };
    let mut scheduler = scheduler(&dir, handle, 1);

    let summary = scheduler.run(CancellationToken::new()).await.unwrap();
    assert_eq!(summary.samples + summary.failures, 4);
    assert_eq!(summary.failures, 2);

    let parsed = LogReader::read_session(&summary.segments).unwrap();
    assert_eq!(parsed.failure_count(), 2);
    assert_eq!(parsed.skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_workflow_produces_report() {
    let dir = TempDir::new().unwrap();
    let config = MonitorConfig {
        interval: Duration::from_secs(30),
        log_dir: dir.path().join("logs"),
        ..MonitorConfig::new()
    };

    // Samples at 0s, 30s, 60s, 90s, then the process exits
    let (summary, artifacts) = run_monitor(FakeProcess::alive_for(5), &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::ProcessTerminated);
    assert_eq!(summary.samples, 4);

    let artifacts = artifacts.expect("analysis artifacts");
    assert!(artifacts.report.to_string_lossy().ends_with("_report.txt"));
    assert!(artifacts.report.exists());
    assert_eq!(artifacts.result.session.samples, 4);
}

#[tokio::test(start_paused = true)]
async fn test_rotation_failure_backs_off_and_keeps_current_file() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("fake.log");
    // A directory squatting on the successor name makes every rotation fail
    fs::create_dir(next_log_path(&first)).unwrap();

    let store = LogStore::open_path(first.clone(), MemoryUnit::MB, 1).unwrap();
    let sampler = Sampler::new(MemoryUnit::MB, PrivateMemoryProbe::UniqueSet);
    let mut scheduler =
        SamplingScheduler::new(FakeProcess::immortal(), sampler, store, Duration::from_secs(5));
    let token = CancellationToken::new();
    let started = Instant::now();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            token.cancel();
        })
    };

    let summary = scheduler.run(token).await.unwrap();
    canceller.await.unwrap();

    // The 1s backoff replaces the 5s interval: ticks at 0, 1, 2, 3, then
    // cancellation interrupts the fourth backoff
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.samples, 4);
    assert_eq!(summary.tick_errors, 4);
    assert_eq!(summary.segments, vec![first.clone()]);

    let parsed = LogReader::read(&first).unwrap();
    assert_eq!(parsed.samples().count(), 4);
    assert_eq!(parsed.skipped, 0);
}

#[cfg(target_os = "linux")]
mod write_failure {
    use super::*;
    use pretty_assertions::assert_eq;
    use nix::sys::resource::{getrlimit, setrlimit, Resource};
    use nix::sys::signal::{signal, SigHandler, Signal};

    /// Process-wide file size cap, restored on drop
    struct FileSizeLimit {
        soft: u64,
        hard: u64,
        previous_handler: SigHandler,
    }

    impl FileSizeLimit {
        fn set(limit: u64) -> Self {
            // Writes past the cap must fail with EFBIG instead of killing the process
            let previous_handler = unsafe { signal(Signal::SIGXFSZ, SigHandler::SigIgn) }.unwrap();
            let (soft, hard) = getrlimit(Resource::RLIMIT_FSIZE).unwrap();
            setrlimit(Resource::RLIMIT_FSIZE, limit, hard).unwrap();
            Self {
                soft,
                hard,
                previous_handler,
            }
        }
    }

    impl Drop for FileSizeLimit {
        fn drop(&mut self) {
            let _ = setrlimit(Resource::RLIMIT_FSIZE, self.soft, self.hard);
            let _ = unsafe { signal(Signal::SIGXFSZ, self.previous_handler) };
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_append_ends_session_with_sample_count() {
        let dir = TempDir::new().unwrap();
        let sampler = Sampler::new(MemoryUnit::MB, PrivateMemoryProbe::UniqueSet);

        // One real row, shaped exactly like the scheduler's first sample
        let seed_path = dir.path().join("seed.log");
        let mut seed = LogStore::open_path(seed_path.clone(), MemoryUnit::MB, 10 * MB).unwrap();
        let record: LogRecord = sampler.sample(&mut FakeProcess::immortal()).unwrap().into();
        seed.append(&record).unwrap();
        seed.close().unwrap();
        let seed_text = fs::read_to_string(&seed_path).unwrap();
        let (header, row) = seed_text.split_once('\n').unwrap();

        // Pad far beyond what concurrent tests write so the cap only bites here
        let log = dir.path().join("fake.log");
        let mut body = format!("{header}\n");
        let mut padding_rows = 0;
        while body.len() < 1 << 20 {
            body.push_str(row);
            padding_rows += 1;
        }
        fs::write(&log, &body).unwrap();
        let padded = body.len() as u64;
        let row_len = row.len() as u64;

        // Room for one more row and half of the next
        let _limit = FileSizeLimit::set(padded + row_len + row_len / 2);
        let store = LogStore::open_path(log.clone(), MemoryUnit::MB, 10 * MB).unwrap();
        let mut scheduler =
            SamplingScheduler::new(FakeProcess::immortal(), sampler, store, Duration::from_secs(1));

        let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
        match err {
            SchedulerError::Storage { samples, path, .. } => {
                assert_eq!(samples, 1);
                assert_eq!(path, log);
            }
            other => panic!("expected storage error, got {other:?}"),
        }
        assert_eq!(
            scheduler.state(),
            SchedulerState::Stopped(StopReason::StorageFailure)
        );
        assert!(!scheduler.store().is_open());

        // The half-written row was cut back before the retry and after it
        assert_eq!(fs::metadata(&log).unwrap().len(), padded + row_len);
        let parsed = LogReader::read(&log).unwrap();
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.records.len(), padding_rows + 1);
    }
}
