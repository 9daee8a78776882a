/*!
 * sysinfo Process Handle
 * Live process access backed by sysinfo, with procfs for private memory
 */

use crate::core::Pid;
use crate::monitoring::{PrivateMemoryProbe, ProcessHandle, ProcessMemory, SampleError};
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

use super::DiscoveryError;

/// Handle to one real process
///
/// Keeps its own `System` so each refresh touches only the target process.
pub struct SysinfoProcess {
    system: System,
    pid: sysinfo::Pid,
    name: String,
}

impl SysinfoProcess {
    /// Attach to `pid`, failing if it does not exist or has already exited
    pub fn attach(pid: Pid) -> Result<Self, DiscoveryError> {
        let mut system = System::new();
        let target = sysinfo::Pid::from_u32(pid);
        refresh_target(&mut system, target);

        let process = system.process(target).ok_or(DiscoveryError::NotFound { pid })?;
        if is_defunct(process.status()) {
            return Err(DiscoveryError::Terminated { pid });
        }
        let name = process.name().to_string_lossy().into_owned();
        debug!(pid, name = %name, "attached to process");

        Ok(Self {
            system,
            pid: target,
            name,
        })
    }
}

impl ProcessHandle for SysinfoProcess {
    fn pid(&self) -> Pid {
        self.pid.as_u32()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_alive(&mut self) -> bool {
        refresh_target(&mut self.system, self.pid);
        self.system
            .process(self.pid)
            .map(|p| !is_defunct(p.status()))
            .unwrap_or(false)
    }

    fn read_memory(&mut self, probe: PrivateMemoryProbe) -> Result<ProcessMemory, SampleError> {
        refresh_target(&mut self.system, self.pid);
        let process = self.system.process(self.pid).ok_or(SampleError::ProcessGone)?;
        if is_defunct(process.status()) {
            return Err(SampleError::ProcessGone);
        }

        let mut memory = counters(process.memory(), process.virtual_memory())?;
        read_private_inputs(self.pid.as_u32(), probe, &mut memory)?;
        Ok(memory)
    }

    fn total_system_memory(&mut self) -> Result<u64, SampleError> {
        self.system.refresh_memory();
        Ok(self.system.total_memory())
    }
}

fn refresh_target(system: &mut System, pid: sysinfo::Pid) {
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new().with_memory(),
    );
}

pub(super) fn is_defunct(status: ProcessStatus) -> bool {
    matches!(status, ProcessStatus::Zombie | ProcessStatus::Dead)
}

/// Validate the counters sysinfo reported for a live process
///
/// sysinfo reports zero for both counters when the OS refuses to expose a
/// process's memory (protected processes on macOS and Windows).
fn counters(rss: u64, vms: u64) -> Result<ProcessMemory, SampleError> {
    if rss == 0 && vms == 0 {
        return Err(SampleError::AccessDenied);
    }
    Ok(ProcessMemory {
        rss,
        vms,
        unique: None,
        shared: None,
    })
}

/// Map a procfs read error; `None` means the metric is just unavailable
#[cfg(target_os = "linux")]
fn procfs_failure(error: &std::io::Error) -> Option<SampleError> {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::NotFound => Some(SampleError::ProcessGone),
        ErrorKind::PermissionDenied => Some(SampleError::AccessDenied),
        _ => None,
    }
}

/// Collect private-memory inputs
#[cfg(target_os = "linux")]
fn read_private_inputs(
    pid: Pid,
    probe: PrivateMemoryProbe,
    memory: &mut ProcessMemory,
) -> Result<(), SampleError> {
    use super::procfs;

    if probe == PrivateMemoryProbe::UniqueSet {
        match procfs::unique_set_size(pid) {
            Ok(unique) => {
                memory.unique = Some(unique);
                return Ok(());
            }
            Err(e) => match procfs_failure(&e) {
                Some(SampleError::ProcessGone) => return Err(SampleError::ProcessGone),
                // smaps_rollup is owner-only; statm is world-readable
                _ => debug!(pid, error = %e, "unique set unavailable, using statm"),
            },
        }
    }

    if probe != PrivateMemoryProbe::Unavailable {
        match procfs::shared_resident(pid) {
            Ok(shared) => memory.shared = Some(shared),
            Err(e) => match procfs_failure(&e) {
                Some(failure) => return Err(failure),
                None => debug!(pid, error = %e, "shared memory unavailable, private reported as 0"),
            },
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn read_private_inputs(
    _pid: Pid,
    _probe: PrivateMemoryProbe,
    _memory: &mut ProcessMemory,
) -> Result<(), SampleError> {
    Ok(())
}
