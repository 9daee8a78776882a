/*!
 * Core Module
 * Fundamental types, units, limits, and error handling
 */

pub mod errors;
pub mod limits;
pub mod types;
pub mod units;

// Re-export for convenience
pub use errors::*;
pub use types::{Pid, Timestamp};
pub use units::{round2, MemoryUnit, UnknownUnit};
