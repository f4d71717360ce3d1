use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    thread,
};

use crossbeam::utils::CachePadded;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::error::WorkerError;

/// Handle to a submitted worker. Resolves once the worker has exited, with the
/// worker's terminal error if it stopped early.
pub type WorkerHandle = JoinHandle<Result<(), WorkerError>>;

/// Point-in-time read of the outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub success: u64,
    pub misses: u64,
    pub errors: u64,
}

impl ExecutionSnapshot {
    pub fn total(&self) -> u64 {
        self.success + self.misses + self.errors
    }
}

/// Outcome counters, the run's stop signal, and the facility that runs workers.
///
/// Every counter lives on its own cache line so workers hammering different
/// counters do not invalidate each other. Counters only ever grow within a run;
/// [`reset`](Self::reset) is the only way back to zero.
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    success: CachePadded<AtomicU64>,
    misses: CachePadded<AtomicU64>,
    errors: CachePadded<AtomicU64>,
    stopped: AtomicBool,
    running: AtomicBool,
    active: AtomicUsize,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_qps(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_miss_count(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_error_count(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            success: self.success_count(),
            misses: self.miss_count(),
            errors: self.error_count(),
        }
    }

    /// Polled by workers at the top of every iteration.
    #[inline]
    pub fn test_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Signal every worker to finish its current operation and exit. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            tracing::info!("Stop signal raised, {} workers active", self.active_workers());
        }
    }

    /// Number of submitted workers that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Whether a run currently holds the tracker.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the tracker for one run. `None` if another run already holds it.
    pub(crate) fn begin_run(self: &Arc<Self>) -> Option<RunSlot> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .map(|_| RunSlot {
                tracker: Arc::clone(self),
            })
    }

    /// Zero the counters and clear the stop signal for the next run.
    pub fn reset(&self) {
        self.success.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.stopped.store(false, Ordering::Release);
    }

    /// Run an async worker on the runtime.
    ///
    /// The returned handle never carries a panic: a panicking worker resolves to
    /// [`WorkerError::Panicked`]. Either way a failed worker is counted as one
    /// error here, at its outermost boundary.
    pub fn submit<F>(self: &Arc<Self>, worker: usize, work: F) -> WorkerHandle
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let guard = ActiveWorker::enter(Arc::clone(self), worker);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(payload))));
            guard.exit(outcome)
        })
    }

    /// Run a worker that blocks on its I/O on a dedicated OS thread.
    ///
    /// Every blocking worker gets its own thread, so no worker waits in a queue
    /// for another to finish. The returned handle resolves once the thread has
    /// reported its outcome.
    pub fn submit_blocking<F>(self: &Arc<Self>, worker: usize, work: F) -> WorkerHandle
    where
        F: FnOnce() -> Result<(), WorkerError> + Send + 'static,
    {
        let guard = ActiveWorker::enter(Arc::clone(self), worker);
        let (tx, rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name(format!("cacheload-worker-{worker}"))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(work))
                    .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(payload))));
                let _ = tx.send(outcome);
            });

        tokio::spawn(async move {
            let outcome = match spawned {
                Ok(_) => rx.await.unwrap_or_else(|_| {
                    Err(WorkerError::Panicked(String::from(
                        "worker thread exited without reporting",
                    )))
                }),
                Err(e) => Err(WorkerError::Spawn(e.to_string())),
            };
            guard.exit(outcome)
        })
    }
}

/// Exclusive claim on an [`ExecutionTracker`] for the duration of one run.
/// Released on drop.
pub(crate) struct RunSlot {
    tracker: Arc<ExecutionTracker>,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.tracker.running.store(false, Ordering::Release);
    }
}

/// Keeps the active worker count honest even if the task is aborted.
struct ActiveWorker {
    tracker: Arc<ExecutionTracker>,
    worker: usize,
}

impl ActiveWorker {
    fn enter(tracker: Arc<ExecutionTracker>, worker: usize) -> Self {
        tracker.active.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("Worker {worker} spawned.");
        Self { tracker, worker }
    }

    fn exit(self, outcome: Result<(), WorkerError>) -> Result<(), WorkerError> {
        match &outcome {
            Ok(()) => tracing::debug!("Worker {} shutting down.", self.worker),
            Err(e) => {
                self.tracker.increment_error_count();
                tracing::warn!("Worker {} terminated early: {e}", self.worker);
            }
        }
        outcome
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.tracker.active.fetch_sub(1, Ordering::AcqRel);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}
