/*!
 * procfs Readers
 * Private-memory inputs that sysinfo does not expose (Linux only)
 */

use std::fs;
use std::io;

use crate::core::Pid;

/// Unique set size in bytes from `/proc/<pid>/smaps_rollup`
pub(crate) fn unique_set_size(pid: Pid) -> io::Result<u64> {
    let text = fs::read_to_string(format!("/proc/{pid}/smaps_rollup"))?;
    parse_unique_set(&text).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "smaps_rollup has no Private_* entries")
    })
}

/// Shared resident bytes from `/proc/<pid>/statm`
pub(crate) fn shared_resident(pid: Pid) -> io::Result<u64> {
    let text = fs::read_to_string(format!("/proc/{pid}/statm"))?;
    parse_statm_shared(&text, page_size())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed statm"))
}

/// Sum of `Private_Clean` and `Private_Dirty`, in bytes
pub(crate) fn parse_unique_set(text: &str) -> Option<u64> {
    let mut total = 0u64;
    let mut found = false;
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if key != "Private_Clean" && key != "Private_Dirty" {
            continue;
        }
        let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
        total = total.saturating_add(kib.saturating_mul(1024));
        found = true;
    }
    found.then_some(total)
}

/// Third statm field (shared pages) scaled to bytes
pub(crate) fn parse_statm_shared(text: &str, page_size: u64) -> Option<u64> {
    let pages: u64 = text.split_whitespace().nth(2)?.parse().ok()?;
    Some(pages.saturating_mul(page_size))
}

fn page_size() -> u64 {
    nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE)
        .ok()
        .flatten()
        .and_then(|size| u64::try_from(size).ok())
        .unwrap_or(4096)
}
