/*!
 * Process Module
 * Target discovery and live process handles
 */

pub mod discovery;
mod handle;
#[cfg(target_os = "linux")]
mod procfs;

pub use discovery::{
    choose_interactive, filter_by_name, list_processes, matches_name, print_table, select_target,
    sort_by_name, DiscoveryError, ProcessSummary,
};
pub use handle::SysinfoProcess;
