use std::{
    sync::{
        LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crossbeam::utils::CachePadded;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Samples above this are clamped into the top bucket (max stays exact).
const HIGHEST_TRACKABLE: Duration = Duration::from_secs(60);
const SIGNIFICANT_FIGURES: u8 = 3;

static EMPTY_HISTOGRAM: LazyLock<Histogram<u64>> = LazyLock::new(|| {
    Histogram::new_with_bounds(1, HIGHEST_TRACKABLE.as_nanos() as u64, SIGNIFICANT_FIGURES)
        .expect("histogram bounds are constant and valid")
});

static NEXT_THREAD_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_ID: usize = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Aggregate latency figures over the samples recorded so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySnapshot {
    pub count: u64,
    pub mean: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

/// Mergeable latency aggregate: a fixed-size histogram plus exact sum and max.
///
/// Memory does not grow with the number of samples, so a run can go on for as
/// long as it likes.
#[derive(Debug, Clone)]
struct LatencyHistogram {
    histogram: Histogram<u64>,
    total_nanos: u128,
    max_nanos: u64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            histogram: EMPTY_HISTOGRAM.clone(),
            total_nanos: 0,
            max_nanos: 0,
        }
    }

    fn consume(&mut self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(nanos);
        self.total_nanos += u128::from(nanos);
        self.max_nanos = self.max_nanos.max(nanos);
    }

    fn merge(&mut self, other: &Self) {
        // Both sides share the same bounds, so the addition cannot overflow them.
        if let Err(e) = self.histogram.add(&other.histogram) {
            tracing::warn!("Dropping latency shard during merge: {e}");
            return;
        }
        self.total_nanos += other.total_nanos;
        self.max_nanos = self.max_nanos.max(other.max_nanos);
    }

    fn clear(&mut self) {
        self.histogram.reset();
        self.total_nanos = 0;
        self.max_nanos = 0;
    }

    fn quantile(&self, q: f64) -> Duration {
        Duration::from_nanos(self.histogram.value_at_quantile(q))
    }

    fn summarize(&self) -> LatencySnapshot {
        let count = self.histogram.len();
        if count == 0 {
            return LatencySnapshot::default();
        }
        let mean = (self.total_nanos / u128::from(count)) as u64;
        LatencySnapshot {
            count,
            mean: Duration::from_nanos(mean),
            p50: self.quantile(0.50),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
            max: Duration::from_nanos(self.max_nanos),
        }
    }
}

/// Thread-safe recorder of per-operation latencies.
///
/// Recording goes to a shard picked by the calling thread, so workers running
/// on different threads rarely touch the same lock, and each lock is held only
/// for a constant-time histogram update. [`snapshot`](Self::snapshot) merges the
/// shards one at a time and never holds more than one lock.
#[derive(Debug)]
pub struct LatencyTracker {
    shards: Vec<CachePadded<Mutex<LatencyHistogram>>>,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::with_shards(num_cpus::get() * 2)
    }
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `shards` is rounded up to a power of two.
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1).next_power_of_two();
        Self {
            shards: (0..shards)
                .map(|_| CachePadded::new(Mutex::new(LatencyHistogram::new())))
                .collect(),
        }
    }

    #[inline]
    fn shard(&self) -> &Mutex<LatencyHistogram> {
        let mask = self.shards.len() - 1;
        let index = THREAD_ID.with(|id| *id) & mask;
        &self.shards[index]
    }

    #[inline]
    pub fn record_latency(&self, latency: Duration) {
        self.shard().lock().consume(latency);
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let mut merged = LatencyHistogram::new();
        for shard in &self.shards {
            merged.merge(&shard.lock());
        }
        merged.summarize()
    }

    pub fn reset(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}
