/*!
 * Process Discovery
 * Listing, name matching, and interactive selection of the target process
 */

use std::io::{self, BufRead, Write};

use miette::Diagnostic;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::handle::{is_defunct, SysinfoProcess};
use crate::core::types::{format_display_seconds, Timestamp};
use crate::core::Pid;

/// Target selection errors
#[derive(Error, Debug, Diagnostic)]
pub enum DiscoveryError {
    #[error("Process {pid} does not exist")]
    #[diagnostic(code(discovery::not_found), help("Run `memwatch list` to see running processes."))]
    NotFound { pid: Pid },

    #[error("Process {pid} has already terminated")]
    #[diagnostic(code(discovery::terminated))]
    Terminated { pid: Pid },

    #[error("No running process matches '{name}'")]
    #[diagnostic(
        code(discovery::no_match),
        help("Matching is a case-insensitive substring search on the process name.")
    )]
    NoMatch { name: String },

    #[error("No processes are visible")]
    #[diagnostic(code(discovery::empty))]
    NoProcesses,

    #[error("Process selection cancelled")]
    #[diagnostic(code(discovery::cancelled))]
    Cancelled,

    #[error("Failed to read selection: {0}")]
    #[diagnostic(code(discovery::prompt))]
    Prompt(#[from] io::Error),
}

/// One row of the process listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub name: String,
    pub started: Option<Timestamp>,
    pub user: Option<String>,
}

/// Snapshot of running processes, sorted by name (case-insensitive)
pub fn list_processes() -> Vec<ProcessSummary> {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::new().with_user(UpdateKind::OnlyIfNotSet),
    );
    let users = Users::new_with_refreshed_list();

    let mut processes: Vec<ProcessSummary> = system
        .processes()
        .iter()
        .filter(|(_, p)| !is_defunct(p.status()))
        .map(|(pid, p)| ProcessSummary {
            pid: pid.as_u32(),
            name: p.name().to_string_lossy().into_owned(),
            started: start_time(p.start_time()),
            user: p
                .user_id()
                .and_then(|uid| users.get_user_by_id(uid))
                .map(|user| user.name().to_string()),
        })
        .collect();
    sort_by_name(&mut processes);
    debug!(count = processes.len(), "process list refreshed");
    processes
}

/// Sort by lowercase name, then pid
pub fn sort_by_name(processes: &mut [ProcessSummary]) {
    processes.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.pid.cmp(&b.pid))
    });
}

/// Case-insensitive substring match
pub fn matches_name(candidate: &str, needle: &str) -> bool {
    candidate.to_lowercase().contains(&needle.to_lowercase())
}

/// Processes whose name contains `needle`
pub fn filter_by_name(processes: &[ProcessSummary], needle: &str) -> Vec<ProcessSummary> {
    processes
        .iter()
        .filter(|p| matches_name(&p.name, needle))
        .cloned()
        .collect()
}

/// Resolve the target from a pid, a name, or an interactive choice
///
/// A pid wins over a name. A name with several matches, or neither argument,
/// falls through to a numbered prompt on stdin.
pub fn select_target(pid: Option<Pid>, name: Option<&str>) -> Result<SysinfoProcess, DiscoveryError> {
    if let Some(pid) = pid {
        return SysinfoProcess::attach(pid);
    }

    let all = list_processes();
    let candidates = match name {
        Some(needle) => {
            let matched = filter_by_name(&all, needle);
            if matched.is_empty() {
                return Err(DiscoveryError::NoMatch {
                    name: needle.to_string(),
                });
            }
            if let [only] = matched.as_slice() {
                info!(pid = only.pid, name = %only.name, "unique process match");
                return SysinfoProcess::attach(only.pid);
            }
            matched
        }
        None => all,
    };

    if candidates.is_empty() {
        return Err(DiscoveryError::NoProcesses);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let pid = choose_interactive(&candidates, stdin.lock(), stdout.lock())?;
    SysinfoProcess::attach(pid)
}

/// Numbered prompt over `candidates`; `q` (or end of input) cancels
pub fn choose_interactive<R: BufRead, W: Write>(
    candidates: &[ProcessSummary],
    mut input: R,
    mut output: W,
) -> Result<Pid, DiscoveryError> {
    print_table(candidates, &mut output)?;

    let mut line = String::new();
    loop {
        write!(output, "Select a process number (1-{}, q to quit): ", candidates.len())?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(DiscoveryError::Cancelled);
        }

        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Err(DiscoveryError::Cancelled);
        }

        match answer.parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(candidates[n - 1].pid),
            _ => writeln!(output, "Invalid choice '{answer}'")?,
        }
    }
}

/// Render the listing used by `memwatch list` and the prompt
pub fn print_table<W: Write>(processes: &[ProcessSummary], output: &mut W) -> io::Result<()> {
    writeln!(output, "{:>4}  {:>8}  {:<19}  {:<12}  NAME", "#", "PID", "STARTED", "USER")?;
    for (i, p) in processes.iter().enumerate() {
        let started = p.started.map(format_display_seconds).unwrap_or_else(|| "-".to_string());
        let user = p.user.as_deref().unwrap_or("-");
        writeln!(output, "{:>4}  {:>8}  {:<19}  {:<12}  {}", i + 1, p.pid, started, user, p.name)?;
    }
    Ok(())
}

fn start_time(epoch_secs: u64) -> Option<Timestamp> {
    let secs = i64::try_from(epoch_secs).ok()?;
    let utc = OffsetDateTime::from_unix_timestamp(secs).ok()?;
    let local = time::UtcOffset::current_local_offset()
        .map(|offset| utc.to_offset(offset))
        .unwrap_or(utc);
    Some(Timestamp::new(local.date(), local.time()))
}
