use std::time::Instant;

use super::{WorkerContext, retry::RetryBudget};
use crate::{
    client::{CacheClient, CacheError},
    error::WorkerError,
};

enum Read {
    Hit,
    Miss,
    Failed(CacheError),
}

/// One worker of the batched pattern.
///
/// Owns its key set and retry budget outright; the only shared state it
/// touches is the trackers.
pub(crate) struct BatchedWorker<C: CacheClient> {
    ctx: WorkerContext<C>,
    batch_size: usize,
    budget: RetryBudget,
    keys: Vec<String>,
    needs_seed: bool,
}

impl<C: CacheClient> BatchedWorker<C> {
    pub(crate) fn new(ctx: WorkerContext<C>, batch_size: usize, max_retries: u32) -> Self {
        Self {
            ctx,
            batch_size,
            budget: RetryBudget::new(max_retries),
            keys: Vec::new(),
            needs_seed: true,
        }
    }

    /// Replace the key set with fresh keys, all written with one random value
    /// in a single call.
    ///
    /// A failed write counts one error and leaves the worker unseeded; the next
    /// iteration tries again with another fresh key set.
    async fn reseed(&mut self) {
        let keys = self.ctx.generator.random_keys(self.batch_size);
        let value = self.ctx.generator.random_value(self.ctx.value_size);
        match self.ctx.client.put_all(&keys, value).await {
            Ok(()) => {
                self.ctx.execution.increment_qps();
                self.keys = keys;
                self.needs_seed = false;
            }
            Err(e) => {
                tracing::debug!("Worker {} seed write failed: {e}", self.ctx.id);
                self.ctx.execution.increment_error_count();
                self.needs_seed = true;
            }
        }
    }

    async fn read(&self) -> Read {
        let start = Instant::now();
        match self.ctx.client.get_all(&self.keys).await {
            Ok(values) => {
                self.ctx.latency.record_latency(start.elapsed());
                if values.is_empty() {
                    Read::Miss
                } else {
                    Read::Hit
                }
            }
            Err(e) => Read::Failed(e),
        }
    }

    pub(crate) async fn run(mut self) -> Result<(), WorkerError> {
        self.reseed().await;

        while !self.ctx.execution.test_stopped() {
            if self.needs_seed {
                self.reseed().await;
                if self.needs_seed {
                    continue;
                }
            }
            match self.read().await {
                Read::Hit => {
                    self.ctx.execution.increment_qps();
                    self.budget.reset();
                }
                Read::Miss => {
                    if self.budget.record_failure() {
                        self.ctx.execution.increment_miss_count();
                        self.reseed().await;
                    }
                }
                Read::Failed(e) => {
                    tracing::trace!("Worker {} read failed: {e}", self.ctx.id);
                    if self.budget.record_failure() {
                        self.ctx.execution.increment_error_count();
                        self.reseed().await;
                    }
                }
            }
        }
        Ok(())
    }
}
