use thiserror::Error;

use crate::client::CacheError;

/// Rejected run or fault configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value size range: min {min} is greater than max {max}")]
    InvalidValueSizeRange { min: usize, max: usize },

    #[error("worker count must be greater than zero")]
    NoWorkers,

    #[error("batch size must be greater than zero")]
    EmptyBatch,

    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
}

/// Why a worker stopped before observing the stop signal.
///
/// Produced at the worker boundary; each one accounts for exactly one
/// error in the [`ExecutionTracker`](crate::ExecutionTracker).
#[derive(Error, Debug, Clone)]
pub enum WorkerError {
    #[error("cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a run is already in progress with {active} active workers")]
    RunInProgress { active: usize },

    #[error("put failed for key={key} (encoded {encoded_key}) at iteration {iteration}: {source}")]
    SetFailed {
        key: String,
        encoded_key: String,
        iteration: usize,
        #[source]
        source: CacheError,
    },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}
