//! The boundary to the cache service under test.
//!
//! The engine only ever talks to a [`CacheClient`]. Transport, wire protocol and
//! serialization belong to the implementation; the engine only cares whether a
//! call completed with data, completed without data, or could not complete.
pub mod memory;

pub use memory::{FaultConfig, InMemoryCache};

use std::{collections::HashMap, future::Future, time::Duration};

use bytes::Bytes;
use thiserror::Error;

/// Opaque cached payload.
pub type Value = Bytes;

/// The cache call itself could not be completed.
///
/// Absence of data is never an error: it is reported as `None` or as a key
/// missing from a batched result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("serialization failure: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

/// Client for a remote key-value cache.
///
/// Single-key operations are blocking and are driven from blocking worker
/// threads. Batched operations are asynchronous.
pub trait CacheClient
where
    Self: Send + Sync + 'static,
{
    /// Store `value` under `key`. `Ok(false)` means the service declined the write.
    fn put(&self, key: &str, value: Value) -> Result<bool, CacheError>;

    /// Fetch `key`. `Ok(None)` means the call completed but found no data.
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store the same `value` under every key in one call.
    fn put_all(
        &self,
        keys: &[String],
        value: Value,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Fetch every key in one call. Keys without data are left out of the map.
    fn get_all(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<HashMap<String, Value>, CacheError>> + Send;

    /// The form of `key` the service itself stores and reports, e.g. in hot key
    /// listings. Identity unless the client namespaces or hashes keys.
    fn encode_key(&self, key: &str) -> String {
        key.to_owned()
    }
}
