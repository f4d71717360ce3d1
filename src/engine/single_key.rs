use std::time::Instant;

use super::WorkerContext;
use crate::{client::CacheClient, error::WorkerError};

/// One worker of the single-key pattern. Blocks on every cache call, so it
/// must run on a blocking thread.
///
/// The key is written before the loop and is expected to stay readable for the
/// whole run; a read that finds nothing is an error, not a miss. A read that
/// fails outright ends the worker.
pub(crate) fn run<C: CacheClient>(ctx: WorkerContext<C>) -> Result<(), WorkerError> {
    let key = ctx.generator.random_key();
    let value = ctx.generator.random_value(ctx.value_size);
    if !ctx.client.put(&key, value)? {
        tracing::debug!("Worker {} seed write for key={key} was declined", ctx.id);
    }
    ctx.execution.increment_qps();

    while !ctx.execution.test_stopped() {
        let start = Instant::now();
        let value = ctx.client.get(&key)?;
        ctx.latency.record_latency(start.elapsed());

        match value {
            Some(_) => ctx.execution.increment_qps(),
            None => ctx.execution.increment_error_count(),
        }
    }
    Ok(())
}
