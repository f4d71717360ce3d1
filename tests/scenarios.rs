mod common;

use std::{sync::Arc, time::Duration};

use cacheload::{FaultConfig, InMemoryCache, LoadTestEngine, WorkerError, WorkerOutcome};
use common::{PoisonedKeyCache, RUN, RecordingCache, batched, single_key};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batched_against_healthy_cache_only_hits() {
    let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
    let outcome = engine.run_for(&batched(1, 1, 0), RUN).await.unwrap();

    let counts = engine.execution().snapshot();
    assert_eq!(outcome.completed_workers(), 1);
    assert_eq!(counts.errors, 0);
    assert_eq!(counts.misses, 0);
    assert!(counts.success >= 1);
    // one seeding write, then one timed read per success
    assert_eq!(engine.latency().snapshot().count, counts.success - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batched_against_forgetful_cache_misses_every_iteration() {
    let cache = InMemoryCache::with_faults(FaultConfig::builder().drop_writes(true).build());
    let engine = LoadTestEngine::new(Arc::new(cache));
    engine.run_for(&batched(1, 1, 0), RUN).await.unwrap();

    let counts = engine.execution().snapshot();
    let iterations = engine.latency().snapshot().count;
    assert!(iterations > 0);
    assert_eq!(counts.misses, iterations);
    assert_eq!(counts.errors, 0);
    // the initial seed plus one reseed after every miss
    assert_eq!(counts.success, iterations + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_key_against_healthy_cache() {
    let engine = LoadTestEngine::new(Arc::new(InMemoryCache::new()));
    let outcome = engine.run_for(&single_key(3), RUN).await.unwrap();

    let counts = engine.execution().snapshot();
    let reads = engine.latency().snapshot().count;
    assert_eq!(outcome.completed_workers(), 3);
    assert_eq!(counts.errors, 0);
    assert_eq!(counts.misses, 0);
    assert_eq!(counts.success, reads + 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_key_failure_ends_only_that_worker() {
    let engine = LoadTestEngine::new(Arc::new(PoisonedKeyCache::default()));
    let outcome = engine.run_for(&single_key(3), RUN).await.unwrap();

    let counts = engine.execution().snapshot();
    let reads = engine.latency().snapshot().count;
    assert_eq!(outcome.workers.len(), 3);
    assert_eq!(outcome.completed_workers(), 2);
    assert_eq!(outcome.failed_workers(), 1);
    assert!(outcome.workers.iter().any(|w| matches!(
        w,
        WorkerOutcome::Failed(WorkerError::Cache(_))
    )));
    assert_eq!(counts.errors, 1);
    // three seeds plus one success per timed read of the healthy workers
    assert_eq!(counts.success, reads + 3);
    assert!(reads > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_key_counts_missing_value_as_error() {
    let cache = InMemoryCache::with_faults(FaultConfig::builder().drop_writes(true).build());
    let engine = LoadTestEngine::new(Arc::new(cache));
    let outcome = engine.run_for(&single_key(2), RUN).await.unwrap();

    let counts = engine.execution().snapshot();
    assert_eq!(outcome.completed_workers(), 2);
    assert_eq!(counts.misses, 0);
    assert_eq!(counts.success, 2);
    assert_eq!(counts.errors, engine.latency().snapshot().count);
}

#[test]
fn single_key_workers_all_start_past_the_blocking_pool_cap() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let cache = Arc::new(RecordingCache::default());
        let engine = Arc::new(LoadTestEngine::new(Arc::clone(&cache)));
        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run(&single_key(3)).await })
        };

        let all_seeded = tokio::time::timeout(Duration::from_secs(5), async {
            while cache.seeded.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(all_seeded.is_ok(), "a worker never started while the run was live");
        assert!(!runner.is_finished());
        assert_eq!(engine.execution().active_workers(), 3);

        engine.execution().stop();
        let outcome = runner.await.unwrap().unwrap();
        assert_eq!(outcome.completed_workers(), 3);
    });
}
