//! A load-testing harness for key-value cache services.
//!
//! cacheload drives sustained read/write traffic against a cache through a
//! [`CacheClient`] and measures achieved throughput, tail latency, and miss
//! and error rates under a configurable concurrency, payload size and retry
//! policy.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`RunConfig`]: immutable parameters of a run (value sizes, worker count,
//!   traffic pattern).
//! - [`KeyValueGenerator`]: random keys and payloads.
//! - [`CacheClient`]: the boundary to the service under test. [`InMemoryCache`]
//!   is a process-local implementation with fault injection.
//! - [`ExecutionTracker`]: outcome counters, the shared stop signal, and the
//!   facility that runs workers.
//! - [`LatencyTracker`]: concurrent latency recording with percentile read-out.
//! - [`LoadTestEngine`]: spawns the workers, runs the traffic pattern in each,
//!   and waits for all of them.
//! - [`RunReport`] and [`Reporter`]: the final figures and where they go.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use cacheload::{
//!     InMemoryCache, LoadTestEngine, Reporter, RunConfig, RunReport, TextReporter,
//!     TrafficPattern, ValueSizeRange,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build the client once, outside the workers.
//!     let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
//!     let config = RunConfig::builder()
//!         .value_size(ValueSizeRange::new(100, 1_000)?)
//!         .workers(16)
//!         .pattern(TrafficPattern::Batched { batch_size: 10, max_retries: 3 })
//!         .build();
//!
//!     let outcome = engine.run_for(&config, Duration::from_secs(10)).await?;
//!     let report = RunReport::collect(&config, engine.execution(), engine.latency(), &outcome);
//!     TextReporter.report(&report).await?;
//!     Ok(())
//! }
//! ```

/// The cache under test
pub mod client;
/// Run parameters
pub mod config;
/// Workers and their orchestration
pub mod engine;
/// Error types
pub mod error;
/// Random keys and values
pub mod generator;
/// Final figures and where they are sent
pub mod report;
/// Shared counters, stop signal and latency recording
pub mod tracker;

pub use client::{CacheClient, CacheError, FaultConfig, InMemoryCache, Value};
pub use config::{RunConfig, TrafficPattern, ValueSizeRange};
pub use engine::{LoadTestEngine, RetryBudget, RunOutcome, SetRecord, WorkerOutcome};
pub use error::{ConfigError, EngineError, ReportError, WorkerError};
pub use generator::KeyValueGenerator;
pub use report::{JsonReporter, Reporter, RunReport, TextReporter};
pub use tracker::{
    ExecutionSnapshot, ExecutionTracker, LatencySnapshot, LatencyTracker, WorkerHandle,
};
