use serde::{Deserialize, Serialize};

use super::LoadTestEngine;
use crate::{client::CacheClient, config::ValueSizeRange, error::EngineError};

/// One write performed by [`LoadTestEngine::run_set`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRecord {
    pub key: String,
    /// The key as the service stores it, see [`CacheClient::encode_key`].
    pub encoded_key: String,
    pub iteration: usize,
    pub value_len: usize,
    /// `false` when the cache accepted the call but declined to store the value.
    pub stored: bool,
}

impl<C: CacheClient> LoadTestEngine<C> {
    /// Overwrite `key` with a fresh random value `iterations` times.
    ///
    /// Every completed write counts as one success. The first write that fails
    /// is counted as one error and ends the pattern. Both the key and its
    /// encoded form are logged so writes can be matched against server-side
    /// hot key reports.
    ///
    /// Blocks on each write. From async code, call it inside
    /// `tokio::task::spawn_blocking`.
    pub fn run_set(
        &self,
        key: &str,
        value_size: ValueSizeRange,
        iterations: usize,
    ) -> Result<Vec<SetRecord>, EngineError> {
        value_size.validate()?;
        let encoded_key = self.client.encode_key(key);
        let mut records = Vec::with_capacity(iterations);

        for iteration in 0..iterations {
            let value = self.generator.random_value(value_size);
            let value_len = value.len();
            match self.client.put(key, value) {
                Ok(stored) => {
                    if stored {
                        tracing::info!("Put key={key}, encodedKey={encoded_key}");
                    } else {
                        tracing::info!(
                            "Put declined for key={key}, encodedKey={encoded_key} at iteration {iteration}"
                        );
                    }
                    self.execution.increment_qps();
                    records.push(SetRecord {
                        key: key.to_owned(),
                        encoded_key: encoded_key.clone(),
                        iteration,
                        value_len,
                        stored,
                    });
                }
                Err(source) => {
                    tracing::error!(
                        "Put failed for key={key}, encodedKey={encoded_key} at iteration {iteration}: {source}"
                    );
                    self.execution.increment_error_count();
                    return Err(EngineError::SetFailed {
                        key: key.to_owned(),
                        encoded_key,
                        iteration,
                        source,
                    });
                }
            }
        }
        Ok(records)
    }
}
