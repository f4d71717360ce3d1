#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use cacheload::{
    CacheClient, CacheError, InMemoryCache, RunConfig, TrafficPattern, Value, ValueSizeRange,
};
use parking_lot::Mutex;

pub const RUN: Duration = Duration::from_millis(150);

pub fn batched(workers: usize, batch_size: usize, max_retries: u32) -> RunConfig {
    RunConfig::builder()
        .value_size(ValueSizeRange::fixed(10))
        .workers(workers)
        .pattern(TrafficPattern::Batched {
            batch_size,
            max_retries,
        })
        .build()
}

pub fn single_key(workers: usize) -> RunConfig {
    RunConfig::builder()
        .value_size(ValueSizeRange::fixed(10))
        .workers(workers)
        .pattern(TrafficPattern::SingleKey)
        .build()
}

/// Reads of the first key ever written fail; everything else is served normally.
#[derive(Default)]
pub struct PoisonedKeyCache {
    inner: InMemoryCache,
    poisoned: OnceLock<String>,
}

impl CacheClient for PoisonedKeyCache {
    fn put(&self, key: &str, value: Value) -> Result<bool, CacheError> {
        let _ = self.poisoned.set(key.to_owned());
        self.inner.put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        if self.poisoned.get().is_some_and(|p| p == key) {
            return Err(CacheError::Transport(String::from("connection reset")));
        }
        self.inner.get(key)
    }

    async fn put_all(&self, keys: &[String], value: Value) -> Result<(), CacheError> {
        self.inner.put_all(keys, value).await
    }

    async fn get_all(&self, keys: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        self.inner.get_all(keys).await
    }
}

/// The first batched read panics inside the client.
#[derive(Default)]
pub struct PanicOnceCache {
    inner: InMemoryCache,
    panicked: AtomicBool,
}

impl CacheClient for PanicOnceCache {
    fn put(&self, key: &str, value: Value) -> Result<bool, CacheError> {
        self.inner.put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.inner.get(key)
    }

    async fn put_all(&self, keys: &[String], value: Value) -> Result<(), CacheError> {
        self.inner.put_all(keys, value).await
    }

    async fn get_all(&self, keys: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("client bug");
        }
        self.inner.get_all(keys).await
    }
}

/// Remembers every seeded key set and never finds anything.
#[derive(Default)]
pub struct RecordingCache {
    pub seeded: Mutex<Vec<Vec<String>>>,
}

impl CacheClient for RecordingCache {
    fn put(&self, key: &str, _: Value) -> Result<bool, CacheError> {
        self.seeded.lock().push(vec![key.to_owned()]);
        Ok(true)
    }

    fn get(&self, _: &str) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }

    async fn put_all(&self, keys: &[String], _: Value) -> Result<(), CacheError> {
        self.seeded.lock().push(keys.to_vec());
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn get_all(&self, _: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        tokio::task::yield_now().await;
        Ok(HashMap::new())
    }
}

/// Writes start failing once `healthy_puts` have gone through.
pub struct FailingWritesCache {
    pub healthy_puts: usize,
    pub puts: AtomicUsize,
}

impl FailingWritesCache {
    pub fn new(healthy_puts: usize) -> Self {
        Self {
            healthy_puts,
            puts: AtomicUsize::new(0),
        }
    }

    fn write(&self) -> Result<(), CacheError> {
        if self.puts.fetch_add(1, Ordering::SeqCst) >= self.healthy_puts {
            return Err(CacheError::Timeout(Duration::from_millis(500)));
        }
        Ok(())
    }
}

impl CacheClient for FailingWritesCache {
    fn put(&self, _: &str, _: Value) -> Result<bool, CacheError> {
        self.write().map(|_| true)
    }

    fn get(&self, _: &str) -> Result<Option<Value>, CacheError> {
        Ok(Some(Value::from_static(b"v")))
    }

    async fn put_all(&self, _: &[String], _: Value) -> Result<(), CacheError> {
        tokio::task::yield_now().await;
        self.write()
    }

    async fn get_all(&self, keys: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        tokio::task::yield_now().await;
        Ok(keys
            .iter()
            .map(|k| (k.clone(), Value::from_static(b"v")))
            .collect())
    }
}

/// The second batched write fails once; every read misses.
#[derive(Default)]
pub struct FlakyReseedCache {
    pub put_alls: AtomicUsize,
}

impl CacheClient for FlakyReseedCache {
    fn put(&self, _: &str, _: Value) -> Result<bool, CacheError> {
        Ok(true)
    }

    fn get(&self, _: &str) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }

    async fn put_all(&self, _: &[String], _: Value) -> Result<(), CacheError> {
        tokio::task::yield_now().await;
        if self.put_alls.fetch_add(1, Ordering::SeqCst) == 1 {
            return Err(CacheError::Transport(String::from("blip")));
        }
        Ok(())
    }

    async fn get_all(&self, _: &[String]) -> Result<HashMap<String, Value>, CacheError> {
        tokio::task::yield_now().await;
        Ok(HashMap::new())
    }
}
