/*!
 * Sampling Scheduler
 * Drift-free periodic sampling with cancellation and fatal-storage handling
 *
 * Ticks are scheduled against an absolute deadline that advances by exactly
 * one interval. When a tick overruns its slot the deadline resets to now and
 * the next tick runs immediately, with no catch-up burst.
 */

use super::probe::ProcessHandle;
use super::sampler::Sampler;
use super::tracer::SessionSpan;
use crate::core::limits::TICK_ERROR_BACKOFF;
use crate::storage::{LogRecord, LogStore, StoreError};
use miette::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Interrupt, terminate signal, or explicit cancellation
    Cancelled,
    /// Target process exited
    ProcessTerminated,
    /// Log append failed after its retry
    StorageFailure,
}

/// Scheduler lifecycle
///
/// `Idle -> Running -> Stopping -> Stopped`; a stopped scheduler never restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping(StopReason),
    Stopped(StopReason),
}

/// Scheduler errors
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    #[error("Process {pid} is not running")]
    #[diagnostic(
        code(scheduler::not_running),
        help("The target exited before monitoring started. Pick a live process.")
    )]
    NotRunning { pid: u32 },

    #[error("Scheduler already started (state: {state:?})")]
    #[diagnostic(code(scheduler::already_started))]
    AlreadyStarted { state: SchedulerState },

    #[error("Log write failed after {samples} samples (log: {path}): {source}")]
    #[diagnostic(
        code(scheduler::storage),
        help("Samples recorded before the failure remain in the log file.")
    )]
    Storage {
        samples: u64,
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

/// Outcome of one completed session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub stop_reason: StopReason,
    /// Successful samples written
    pub samples: u64,
    /// Failure rows written
    pub failures: u64,
    /// Ticks that started after their slot had already passed
    pub overruns: u64,
    /// Recoverable errors that triggered a backoff
    pub tick_errors: u64,
    /// Every log segment of the session, oldest first
    pub segments: Vec<PathBuf>,
}

impl SessionSummary {
    /// Last segment written
    pub fn final_log(&self) -> Option<&PathBuf> {
        self.segments.last()
    }
}

/// What to do after a tick completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickWait {
    /// Sleep until this deadline
    Sleep(Instant),
    /// The slot was missed by this much; run the next tick now
    Overrun(Duration),
}

/// Absolute-deadline tick planning
#[derive(Debug, Clone)]
pub struct TickPlanner {
    interval: Duration,
    next_deadline: Instant,
}

impl TickPlanner {
    /// Planner whose first tick runs at `start`
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            next_deadline: start,
        }
    }

    /// Advance past the tick that just finished at `now`
    pub fn advance(&mut self, now: Instant) -> TickWait {
        self.next_deadline += self.interval;
        if self.next_deadline > now {
            TickWait::Sleep(self.next_deadline)
        } else {
            let late = now.duration_since(self.next_deadline);
            self.next_deadline = now;
            TickWait::Overrun(late)
        }
    }

    /// Restart the schedule with the next tick at `now`
    pub fn reset(&mut self, now: Instant) {
        self.next_deadline = now;
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

enum TickOutcome {
    Logged,
    ProcessTerminated,
}

enum TickError {
    /// Logging can continue after a short pause
    Recoverable(StoreError),
    /// Durable storage is gone; the session must end
    Fatal(StoreError),
}

#[derive(Debug, Default)]
struct TickStats {
    samples: u64,
    failures: u64,
    overruns: u64,
    tick_errors: u64,
}

/// Drives one monitoring session against a single process
///
/// Owns the handle, sampler and log store for the session's lifetime.
pub struct SamplingScheduler<H: ProcessHandle> {
    handle: H,
    sampler: Sampler,
    store: LogStore,
    interval: Duration,
    state: SchedulerState,
    stats: TickStats,
}

impl<H: ProcessHandle> SamplingScheduler<H> {
    pub fn new(handle: H, sampler: Sampler, store: LogStore, interval: Duration) -> Self {
        Self {
            handle,
            sampler,
            store,
            interval,
            state: SchedulerState::Idle,
            stats: TickStats::default(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LogStore {
        &mut self.store
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Run until cancelled, the process exits, or storage fails
    ///
    /// The log store is closed on every exit path before this returns.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SessionSummary, SchedulerError> {
        if self.state != SchedulerState::Idle {
            return Err(SchedulerError::AlreadyStarted { state: self.state });
        }

        let pid = self.handle.pid();
        if !self.handle.is_alive() {
            self.finish_logged(StopReason::ProcessTerminated);
            return Err(SchedulerError::NotRunning { pid });
        }

        let session = SessionSpan::new(pid, &self.handle.name());
        self.state = SchedulerState::Running;
        info!(
            pid,
            interval_secs = self.interval.as_secs_f64(),
            unit = %self.sampler.unit(),
            private_memory = self.sampler.probe().describe(),
            log = %self.store.current_path().display(),
            "monitoring started"
        );

        let outcome = self.run_loop(&cancel).instrument(session.span().clone()).await;

        match outcome {
            Ok(reason) => {
                let close = self.finish(reason);
                info!(
                    samples = self.stats.samples,
                    failures = self.stats.failures,
                    reason = ?reason,
                    log = %self.store.current_path().display(),
                    "monitoring stopped"
                );
                close.map_err(|source| self.storage_error(source))?;
                Ok(self.summary(session.session_id(), reason))
            }
            Err(source) => {
                // Close result is secondary to the append failure
                self.finish_logged(StopReason::StorageFailure);
                error!(
                    samples = self.stats.samples,
                    log = %self.store.current_path().display(),
                    error = %source,
                    "log write failed, monitoring aborted"
                );
                Err(self.storage_error(source))
            }
        }
    }

    async fn run_loop(&mut self, cancel: &CancellationToken) -> Result<StopReason, StoreError> {
        let mut planner = TickPlanner::new(self.interval, Instant::now());

        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }

            match self.tick() {
                Ok(TickOutcome::Logged) => {}
                Ok(TickOutcome::ProcessTerminated) => return Ok(StopReason::ProcessTerminated),
                Err(TickError::Fatal(e)) => return Err(e),
                Err(TickError::Recoverable(e)) => {
                    self.stats.tick_errors += 1;
                    warn!(error = %e, backoff_secs = TICK_ERROR_BACKOFF.as_secs(), "tick error, backing off");
                    if !sleep_or_cancel(cancel, Instant::now() + TICK_ERROR_BACKOFF).await {
                        return Ok(StopReason::Cancelled);
                    }
                    planner.reset(Instant::now());
                    continue;
                }
            }

            match planner.advance(Instant::now()) {
                TickWait::Sleep(deadline) => {
                    if !sleep_or_cancel(cancel, deadline).await {
                        return Ok(StopReason::Cancelled);
                    }
                }
                TickWait::Overrun(late) => {
                    self.stats.overruns += 1;
                    warn!(
                        late_ms = late.as_millis() as u64,
                        interval_secs = self.interval.as_secs_f64(),
                        "sampling overran its interval, rescheduling from now"
                    );
                }
            }
        }
    }

    fn tick(&mut self) -> Result<TickOutcome, TickError> {
        if !self.handle.is_alive() {
            error!(pid = self.handle.pid(), "target process terminated");
            return Ok(TickOutcome::ProcessTerminated);
        }

        let record: LogRecord = match self.sampler.sample(&mut self.handle) {
            Ok(sample) => {
                info!(
                    rss = sample.rss,
                    private = sample.private_mem,
                    vms = sample.vms,
                    percent = sample.mem_percent,
                    unit = %self.sampler.unit(),
                    "sample"
                );
                sample.into()
            }
            Err(failure) => {
                warn!(reason = %failure.reason, "sample failed");
                failure.into()
            }
        };

        self.store.append(&record).map_err(TickError::Fatal)?;
        if record.is_failure() {
            self.stats.failures += 1;
        } else {
            self.stats.samples += 1;
        }

        self.store.rotate_if_needed().map_err(TickError::Recoverable)?;
        Ok(TickOutcome::Logged)
    }

    fn finish(&mut self, reason: StopReason) -> Result<bool, StoreError> {
        self.state = SchedulerState::Stopping(reason);
        let closed = self.store.close();
        self.state = SchedulerState::Stopped(reason);
        closed
    }

    /// Finish when a close error cannot change the outcome
    fn finish_logged(&mut self, reason: StopReason) {
        if let Err(e) = self.finish(reason) {
            warn!(
                log = %self.store.current_path().display(),
                error = %e,
                "log close failed"
            );
        }
    }

    fn storage_error(&self, source: StoreError) -> SchedulerError {
        SchedulerError::Storage {
            samples: self.stats.samples,
            path: self.store.current_path().to_path_buf(),
            source,
        }
    }

    fn summary(&self, session_id: &str, stop_reason: StopReason) -> SessionSummary {
        SessionSummary {
            session_id: session_id.to_string(),
            stop_reason,
            samples: self.stats.samples,
            failures: self.stats.failures,
            overruns: self.stats.overruns,
            tick_errors: self.stats.tick_errors,
            segments: self.store.segments().to_vec(),
        }
    }
}

/// Sleep until `deadline`; false if cancelled first
async fn sleep_or_cancel(cancel: &CancellationToken, deadline: Instant) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep_until(deadline) => true,
    }
}
