/*!
 * Process Probes
 * Handle abstraction over a live process and the private-memory capability
 *
 * Private memory availability differs per platform. The capability is
 * resolved once at startup so the sampler itself never branches on the OS.
 */

use super::sampler::SampleError;
use crate::core::Pid;

/// Raw memory counters for one process, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessMemory {
    pub rss: u64,
    pub vms: u64,
    /// Precise unique set size, when the probe could read it
    pub unique: Option<u64>,
    /// Shared resident memory, when the probe could read it
    pub shared: Option<u64>,
}

/// How private memory is measured on this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateMemoryProbe {
    /// Precise unique set size (Linux `smaps_rollup`)
    UniqueSet,
    /// Resident minus shared (Linux `statm`)
    ResidentMinusShared,
    /// No metric available; private memory is reported as 0
    Unavailable,
}

impl PrivateMemoryProbe {
    /// Pick the best metric the running system exposes
    pub fn detect() -> Self {
        #[cfg(target_os = "linux")]
        {
            if std::path::Path::new("/proc/self/smaps_rollup").exists() {
                return Self::UniqueSet;
            }
            if std::path::Path::new("/proc/self/statm").exists() {
                return Self::ResidentMinusShared;
            }
        }
        Self::Unavailable
    }

    /// Private bytes from whatever counters were collected
    ///
    /// Unique set wins, then rss - shared, then 0. A zero here can mean either
    /// "nothing private" or "not measurable"; the two are not distinguished.
    pub fn private_bytes(self, memory: &ProcessMemory) -> u64 {
        if let Some(unique) = memory.unique {
            return unique;
        }
        if let Some(shared) = memory.shared {
            return memory.rss.saturating_sub(shared);
        }
        0
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::UniqueSet => "unique set size",
            Self::ResidentMinusShared => "resident minus shared",
            Self::Unavailable => "unavailable (reported as 0)",
        }
    }
}

/// A live process the scheduler can sample
///
/// Implemented over sysinfo for real processes; tests substitute fakes.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessHandle: Send {
    fn pid(&self) -> Pid;

    fn name(&self) -> String;

    /// Refresh and report whether the process still exists
    fn is_alive(&mut self) -> bool;

    /// Read memory counters, collecting private-memory inputs per `probe`
    fn read_memory(&mut self, probe: PrivateMemoryProbe) -> Result<ProcessMemory, SampleError>;

    /// Total physical memory of the machine, queried fresh each call
    fn total_system_memory(&mut self) -> Result<u64, SampleError>;
}
