/*!
 * Sampler
 * One memory snapshot per call, or a structured failure record
 */

use super::probe::{PrivateMemoryProbe, ProcessHandle};
use crate::core::limits::FAILURE_DETAIL_MAX_CHARS;
use crate::core::types::now_local;
use crate::core::{round2, truncate_chars, MemoryUnit};
use crate::storage::{MemorySample, SampleFailure};
use miette::Diagnostic;
use thiserror::Error;

/// Why a tick could not produce a sample
///
/// None of these are fatal: each becomes a failure row in the log.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SampleError {
    #[error("process terminated")]
    #[diagnostic(code(sample::process_gone))]
    ProcessGone,

    #[error("access denied reading memory")]
    #[diagnostic(
        code(sample::access_denied),
        help("Run with elevated privileges to inspect processes owned by other users.")
    )]
    AccessDenied,

    #[error("sample failed: {0}")]
    #[diagnostic(code(sample::transient))]
    Transient(String),
}

impl SampleError {
    /// Transient failure with its detail capped for log readability
    pub fn transient(detail: impl std::fmt::Display) -> Self {
        SampleError::Transient(truncate_chars(&detail.to_string(), FAILURE_DETAIL_MAX_CHARS))
    }
}

/// Converts handle readings into unit-converted samples
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    unit: MemoryUnit,
    probe: PrivateMemoryProbe,
}

impl Sampler {
    pub fn new(unit: MemoryUnit, probe: PrivateMemoryProbe) -> Self {
        Self { unit, probe }
    }

    /// Sampler using the private-memory probe detected for this platform
    pub fn detect(unit: MemoryUnit) -> Self {
        Self::new(unit, PrivateMemoryProbe::detect())
    }

    pub fn unit(&self) -> MemoryUnit {
        self.unit
    }

    pub fn probe(&self) -> PrivateMemoryProbe {
        self.probe
    }

    /// Take one snapshot
    pub fn sample<H: ProcessHandle + ?Sized>(
        &self,
        handle: &mut H,
    ) -> Result<MemorySample, SampleFailure> {
        self.read(handle).map_err(|e| SampleFailure {
            timestamp: now_local(),
            pid: handle.pid(),
            process_name: handle.name(),
            reason: e.to_string(),
        })
    }

    fn read<H: ProcessHandle + ?Sized>(&self, handle: &mut H) -> Result<MemorySample, SampleError> {
        let memory = handle.read_memory(self.probe)?;
        let total = handle.total_system_memory()?;
        if total == 0 {
            return Err(SampleError::transient("total system memory reported as 0"));
        }

        let private = self.probe.private_bytes(&memory);
        let mem_percent = round2(memory.rss as f64 / total as f64 * 100.0);

        Ok(MemorySample {
            timestamp: now_local(),
            pid: handle.pid(),
            process_name: handle.name(),
            rss: self.unit.convert(memory.rss),
            vms: self.unit.convert(memory.vms),
            private_mem: self.unit.convert(private),
            mem_percent,
        })
    }
}
