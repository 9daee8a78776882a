/*!
 * Monitoring
 * Sampling, scheduling, shutdown handling, and tracing setup
 */

mod probe;
mod sampler;
mod scheduler;
pub mod shutdown;
mod tracer;

pub use probe::{PrivateMemoryProbe, ProcessHandle, ProcessMemory};
pub use sampler::{SampleError, Sampler};
pub use scheduler::{
    SamplingScheduler, SchedulerError, SchedulerState, SessionSummary, StopReason, TickPlanner,
    TickWait,
};
pub use tracer::{generate_session_id, init_tracing, SessionSpan};
