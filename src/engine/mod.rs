//! LoadTestEngine: orchestration of the worker pool.
//!
//! The engine spawns one worker per requested unit of concurrency and then
//! waits for all of them. Workers run until the shared stop signal in the
//! [`ExecutionTracker`] is raised, checking it only at the top of each
//! iteration, so an in-flight cache call always completes first.
//!
//! # High-level flow
//! 1. The run configuration is validated.
//! 2. N workers are submitted to the [`ExecutionTracker`]. Batched workers are
//!    async tasks; single-key workers block on their client and each runs on a
//!    dedicated thread.
//! 3. Each worker issues its reads, classifies the result, and reports it to
//!    the trackers. Misses and failed reads are retried locally; only counter
//!    increments ever leave the worker.
//! 4. Once the stop signal is raised every worker drains, and the engine
//!    collects each worker's outcome. A worker that died early never keeps the
//!    others from being awaited.
//! 5. The caller reads the final counters and latency snapshot from the
//!    trackers, or builds a [`RunReport`](crate::RunReport) from them.
//!
//! # Traffic patterns
//! - **Batched**: seed `batch_size` keys with one `put_all`, then `get_all` them
//!   in a loop. A hit resets the retry budget. A miss or a failed read spends
//!   one attempt; when the attempts exceed `max_retries` the worker counts one
//!   miss (or one error), throws the key set away and seeds a fresh one.
//! - **Single key**: seed one key with a blocking `put`, then `get` it in a loop.
//!   The key should always be there, so an empty read is counted as an error
//!   straight away, and a failed read ends the worker.
//!
//! # Accounting
//! - Every seeding write counts as one success. A failed batched seeding write
//!   counts as one error and is retried with a fresh key set on the next
//!   iteration.
//! - Every completed read is timed, including reads that are later retried.
//!   Reads that fail outright are not timed.
//! - A miss followed by a hit within the budget reports nothing but the hit.
//! - A worker that ends early is counted as one error at its boundary.
pub mod retry;
pub mod set;

mod batched;
mod single_key;

pub use retry::RetryBudget;
pub use set::SetRecord;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;

use crate::{
    client::CacheClient,
    config::{RunConfig, TrafficPattern, ValueSizeRange},
    error::{EngineError, WorkerError},
    generator::KeyValueGenerator,
    tracker::{ExecutionTracker, LatencyTracker, WorkerHandle},
};
use batched::BatchedWorker;

/// How a single worker ended.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    /// Observed the stop signal and exited its loop.
    Completed,
    /// Terminated early with an error that was counted at its boundary.
    Failed(WorkerError),
    /// The task was cancelled by the runtime before it could finish.
    Aborted(String),
}

/// What the engine hands back once every worker has resolved.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub elapsed: Duration,
    pub workers: Vec<WorkerOutcome>,
}

impl RunOutcome {
    pub fn completed_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| matches!(w, WorkerOutcome::Completed))
            .count()
    }

    pub fn failed_workers(&self) -> usize {
        self.workers.len() - self.completed_workers()
    }
}

/// Everything a worker needs, cloned once per worker.
pub(crate) struct WorkerContext<C: CacheClient> {
    pub(crate) id: usize,
    pub(crate) client: Arc<C>,
    pub(crate) generator: KeyValueGenerator,
    pub(crate) execution: Arc<ExecutionTracker>,
    pub(crate) latency: Arc<LatencyTracker>,
    pub(crate) value_size: ValueSizeRange,
}

/// Drives concurrent read/write traffic against a [`CacheClient`] and reports
/// every outcome to its trackers.
///
/// ```rust,no_run
/// use std::{sync::Arc, time::Duration};
///
/// use cacheload::{InMemoryCache, LoadTestEngine, RunConfig, TrafficPattern, ValueSizeRange};
///
/// # async fn demo() -> Result<(), cacheload::EngineError> {
/// let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
/// let config = RunConfig::builder()
///     .value_size(ValueSizeRange::new(10, 100)?)
///     .workers(8)
///     .pattern(TrafficPattern::Batched { batch_size: 16, max_retries: 2 })
///     .build();
///
/// let outcome = engine.run_for(&config, Duration::from_secs(5)).await?;
/// println!(
///     "{} hits in {:?}, p99 {:?}",
///     engine.execution().success_count(),
///     outcome.elapsed,
///     engine.latency().snapshot().p99,
/// );
/// # Ok(())
/// # }
/// ```
pub struct LoadTestEngine<C: CacheClient> {
    client: Arc<C>,
    generator: KeyValueGenerator,
    execution: Arc<ExecutionTracker>,
    latency: Arc<LatencyTracker>,
}

impl<C: CacheClient> LoadTestEngine<C> {
    /// Engine with its own fresh trackers.
    pub fn new(client: Arc<C>) -> Self {
        Self::with_trackers(
            client,
            Arc::new(ExecutionTracker::new()),
            Arc::new(LatencyTracker::new()),
        )
    }

    pub fn with_trackers(
        client: Arc<C>,
        execution: Arc<ExecutionTracker>,
        latency: Arc<LatencyTracker>,
    ) -> Self {
        Self {
            client,
            generator: KeyValueGenerator::new(),
            execution,
            latency,
        }
    }

    pub fn with_generator(mut self, generator: KeyValueGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn execution(&self) -> &Arc<ExecutionTracker> {
        &self.execution
    }

    pub fn latency(&self) -> &Arc<LatencyTracker> {
        &self.latency
    }

    /// Clear both trackers so the engine can run again.
    pub fn reset(&self) {
        self.execution.reset();
        self.latency.reset();
    }

    /// Start the workers and wait until all of them have resolved.
    ///
    /// Returns only after someone raises the stop signal on
    /// [`execution()`](Self::execution) (and every in-flight call has finished),
    /// or after every worker has died.
    pub async fn run(&self, config: &RunConfig) -> Result<RunOutcome, EngineError> {
        config.validate()?;
        let Some(_slot) = self.execution.begin_run() else {
            return Err(EngineError::RunInProgress {
                active: self.execution.active_workers(),
            });
        };
        // Workers of a cancelled run may still be draining.
        let active = self.execution.active_workers();
        if active > 0 {
            return Err(EngineError::RunInProgress { active });
        }
        if self.execution.test_stopped() {
            tracing::warn!("Stop signal is already raised; call reset() before running again");
        }

        tracing::info!(
            "Running scenario: {} ({} pattern, {} workers)",
            config.name,
            config.pattern.name(),
            config.workers
        );
        let start = Instant::now();
        let handles = self.spawn_workers(config);

        tracing::info!("Waiting for {} workers...", handles.len());
        let workers = collect_outcomes(handles).await;
        let outcome = RunOutcome {
            elapsed: start.elapsed(),
            workers,
        };

        tracing::info!(
            "Done running scenario: {} in {:?}, {} workers ended early",
            config.name,
            outcome.elapsed,
            outcome.failed_workers()
        );
        Ok(outcome)
    }

    /// [`run`](Self::run), raising the stop signal once `duration` has passed.
    pub async fn run_for(
        &self,
        config: &RunConfig,
        duration: Duration,
    ) -> Result<RunOutcome, EngineError> {
        let execution = Arc::clone(&self.execution);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            execution.stop();
        });

        let outcome = self.run(config).await;
        stopper.abort();
        outcome
    }

    fn context(&self, id: usize, value_size: ValueSizeRange) -> WorkerContext<C> {
        WorkerContext {
            id,
            client: Arc::clone(&self.client),
            generator: self.generator.clone(),
            execution: Arc::clone(&self.execution),
            latency: Arc::clone(&self.latency),
            value_size,
        }
    }

    fn spawn_workers(&self, config: &RunConfig) -> Vec<WorkerHandle> {
        tracing::info!("Spawning {} workers...", config.workers);
        (0..config.workers)
            .map(|id| {
                let ctx = self.context(id, config.value_size);
                match config.pattern {
                    TrafficPattern::Batched {
                        batch_size,
                        max_retries,
                    } => self
                        .execution
                        .submit(id, BatchedWorker::new(ctx, batch_size, max_retries).run()),
                    TrafficPattern::SingleKey => self
                        .execution
                        .submit_blocking(id, move || single_key::run(ctx)),
                }
            })
            .collect()
    }
}

async fn collect_outcomes(handles: Vec<WorkerHandle>) -> Vec<WorkerOutcome> {
    join_all(handles)
        .await
        .into_iter()
        .enumerate()
        .map(|(id, res)| match res {
            Ok(Ok(())) => WorkerOutcome::Completed,
            Ok(Err(e)) => WorkerOutcome::Failed(e),
            Err(e) => {
                tracing::error!("Worker {id} could not be joined: {e}");
                WorkerOutcome::Aborted(e.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FaultConfig, InMemoryCache};

    fn batched(workers: usize, batch_size: usize, max_retries: u32) -> RunConfig {
        RunConfig::builder()
            .value_size(ValueSizeRange::fixed(10))
            .workers(workers)
            .pattern(TrafficPattern::Batched {
                batch_size,
                max_retries,
            })
            .build()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawn_expected_number_of_workers() {
        let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
        engine.execution().stop();

        let outcome = engine.run(&batched(10, 2, 0)).await.unwrap();
        assert_eq!(outcome.workers.len(), 10);
        assert_eq!(outcome.completed_workers(), 10);
        // every worker still seeds before it first checks the signal
        assert_eq!(engine.execution().success_count(), 10);
        assert_eq!(engine.latency().snapshot().count, 0);
    }

    #[tokio::test]
    async fn invalid_config_spawns_nothing() {
        let cache = Arc::new(InMemoryCache::new());
        let engine = LoadTestEngine::new(Arc::clone(&cache));

        let result = engine.run(&batched(1, 0, 0)).await;
        assert!(matches!(result, Err(EngineError::Config(_))));
        assert!(cache.is_empty());
        assert_eq!(engine.execution().active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retried_misses_are_timed_but_not_counted() {
        let cache = InMemoryCache::with_faults(FaultConfig::builder().miss_rate(0.5).build());
        let engine = LoadTestEngine::new(Arc::new(cache));

        engine
            .run_for(&batched(2, 4, 3), Duration::from_millis(100))
            .await
            .unwrap();

        let counts = engine.execution().snapshot();
        let latency = engine.latency().snapshot();
        assert_eq!(counts.errors, 0);
        // success = 2 initial seeds + hits + one reseed per reported miss,
        // and each reported miss took 4 timed reads
        let hits = counts.success - 2 - counts.misses;
        assert!(latency.count >= hits + 4 * counts.misses);
        assert!(latency.count > hits);
    }

    #[tokio::test]
    async fn concurrent_runs_admit_exactly_one() {
        let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
        engine.execution().stop();
        let config = batched(2, 1, 0);

        let (first, second) = tokio::join!(engine.run(&config), engine.run(&config));
        let admitted = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 1);
        assert!(
            matches!(first, Err(EngineError::RunInProgress { .. }))
                || matches!(second, Err(EngineError::RunInProgress { .. }))
        );
        assert!(!engine.execution().is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reset_allows_a_second_run() {
        let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
        let config = batched(2, 1, 0);

        engine.run_for(&config, Duration::from_millis(20)).await.unwrap();
        assert!(engine.execution().test_stopped());

        engine.reset();
        assert_eq!(engine.execution().success_count(), 0);
        assert_eq!(engine.latency().snapshot().count, 0);

        let outcome = engine.run_for(&config, Duration::from_millis(20)).await.unwrap();
        assert_eq!(outcome.completed_workers(), 2);
        assert!(engine.execution().success_count() > 2);
    }
}
