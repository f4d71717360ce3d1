//! Shared run state that every worker reports into.
pub mod execution;
pub mod latency;

pub use execution::{ExecutionSnapshot, ExecutionTracker, WorkerHandle};
pub use latency::{LatencySnapshot, LatencyTracker};
