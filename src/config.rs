use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::ConfigError;

/// Inclusive bounds, in bytes, for generated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSizeRange {
    pub min: usize,
    pub max: usize,
}

impl ValueSizeRange {
    pub fn new(min: usize, max: usize) -> Result<Self, ConfigError> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    /// A range that always yields values of exactly `size` bytes.
    pub fn fixed(size: usize) -> Self {
        Self {
            min: size,
            max: size,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::InvalidValueSizeRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    pub fn contains(&self, size: usize) -> bool {
        self.as_range().contains(&size)
    }

    pub fn as_range(&self) -> RangeInclusive<usize> {
        self.min..=self.max
    }
}

/// The traffic shape each worker drives against the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficPattern {
    /// Async batched gets over a seeded key set, retrying misses and errors
    /// up to `max_retries` times before regenerating the set.
    Batched { batch_size: usize, max_retries: u32 },
    /// Blocking gets of one fixed, seeded key per worker. Any miss is an error.
    SingleKey,
}

impl TrafficPattern {
    pub fn name(&self) -> &'static str {
        match self {
            TrafficPattern::Batched { .. } => "batched",
            TrafficPattern::SingleKey => "single_key",
        }
    }
}

/// Parameters of a single load test run. Immutable once the run starts.
///
/// ```rust
/// use cacheload::{RunConfig, TrafficPattern, ValueSizeRange};
///
/// let config = RunConfig::builder()
///     .value_size(ValueSizeRange::fixed(10))
///     .workers(4)
///     .pattern(TrafficPattern::Batched { batch_size: 8, max_retries: 2 })
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct RunConfig {
    #[builder(setter(into), default = String::from("cache load test"))]
    #[serde(default = "default_name")]
    pub name: String,
    pub value_size: ValueSizeRange,
    #[builder(default = num_cpus::get())]
    #[serde(default = "num_cpus::get")]
    pub workers: usize,
    pub pattern: TrafficPattern,
}

fn default_name() -> String {
    String::from("cache load test")
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.value_size.validate()?;
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if let TrafficPattern::Batched { batch_size: 0, .. } = self.pattern {
            return Err(ConfigError::EmptyBatch);
        }
        Ok(())
    }
}
