use std::{collections::HashMap, time::Duration};

use dashmap::DashMap;
use rand::Rng;
use typed_builder::TypedBuilder;

use super::{CacheClient, CacheError, Value};
use crate::error::ConfigError;

/// Faults injected into every read served by an [`InMemoryCache`].
#[derive(Debug, Clone, Copy, PartialEq, TypedBuilder)]
pub struct FaultConfig {
    /// Accept writes but never keep them, so every read misses.
    #[builder(default)]
    pub drop_writes: bool,
    /// Probability in `[0, 1]` that a read reports no data.
    #[builder(default)]
    pub miss_rate: f64,
    /// Probability in `[0, 1]` that a read fails with a transport error.
    #[builder(default)]
    pub error_rate: f64,
    /// Simulated round trip added to every call.
    #[builder(default)]
    pub latency: Duration,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FaultConfig {
    /// Both rates must be finite probabilities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("miss_rate", self.miss_rate), ("error_rate", self.error_rate)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        Ok(())
    }
}

// NaN would make `random_bool` panic.
fn probability(rate: f64) -> f64 {
    if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) }
}

enum ReadFault {
    None,
    Miss,
    Error,
}

/// Process-local [`CacheClient`] backed by a concurrent map.
///
/// Serves as the reference client for the command line harness and the test
/// suite, with optional fault injection to exercise the retry paths.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, Value>,
    faults: FaultConfig,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: FaultConfig) -> Self {
        Self {
            entries: DashMap::new(),
            faults,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn store(&self, key: &str, value: Value) {
        if !self.faults.drop_writes {
            self.entries.insert(key.to_owned(), value);
        }
    }

    // The thread rng is not Send, so the roll happens before any await.
    fn roll(&self) -> ReadFault {
        let mut rng = rand::rng();
        if rng.random_bool(probability(self.faults.error_rate)) {
            ReadFault::Error
        } else if rng.random_bool(probability(self.faults.miss_rate)) {
            ReadFault::Miss
        } else {
            ReadFault::None
        }
    }

    fn injected_error(&self) -> CacheError {
        CacheError::Transport(String::from("injected read failure"))
    }

    fn block(&self) {
        if !self.faults.latency.is_zero() {
            std::thread::sleep(self.faults.latency);
        }
    }

    async fn round_trip(&self) {
        if self.faults.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.faults.latency).await;
        }
    }
}

impl CacheClient for InMemoryCache {
    fn put(&self, key: &str, value: Value) -> Result<bool, CacheError> {
        self.block();
        self.store(key, value);
        Ok(true)
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let fault = self.roll();
        self.block();
        match fault {
            ReadFault::Error => Err(self.injected_error()),
            ReadFault::Miss => Ok(None),
            ReadFault::None => Ok(self.entries.get(key).map(|v| v.value().clone())),
        }
    }

    async fn put_all(&self, keys: &[String], value: Value) -> Result<(), CacheError> {
        self.round_trip().await;
        for key in keys {
            self.store(key, value.clone());
        }
        Ok(())
    }

    async fn get_all(&self, keys: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        let fault = self.roll();
        self.round_trip().await;
        match fault {
            ReadFault::Error => Err(self.injected_error()),
            ReadFault::Miss => Ok(HashMap::new()),
            ReadFault::None => Ok(keys
                .iter()
                .filter_map(|k| {
                    self.entries
                        .get(k)
                        .map(|v| (k.clone(), v.value().clone()))
                })
                .collect()),
        }
    }
}
