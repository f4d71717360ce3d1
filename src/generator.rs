use std::collections::HashSet;

use bytes::Bytes;
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use crate::{client::Value, config::ValueSizeRange};

/// Source of random test keys and payloads.
///
/// Keys are v4 UUIDs (122 random bits), optionally namespaced with a prefix so
/// several harnesses can share one cache without trampling each other.
#[derive(Debug, Clone, Default)]
pub struct KeyValueGenerator {
    prefix: Option<String>,
}

impl KeyValueGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    pub fn random_key(&self) -> String {
        let id = Uuid::new_v4();
        match &self.prefix {
            Some(prefix) => format!("{prefix}{id}"),
            None => id.to_string(),
        }
    }

    /// `n` keys, pairwise distinct.
    pub fn random_keys(&self, n: usize) -> Vec<String> {
        let mut seen = HashSet::with_capacity(n);
        let mut keys = Vec::with_capacity(n);
        while keys.len() < n {
            let key = self.random_key();
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        keys
    }

    /// Alphanumeric payload whose length is drawn uniformly from `size`.
    pub fn random_value(&self, size: ValueSizeRange) -> Value {
        let mut rng = rand::rng();
        let len = rng.random_range(size.as_range());
        let payload: Vec<u8> = rng.sample_iter(Alphanumeric).take(len).collect();
        Bytes::from(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_within_a_call_are_unique() {
        let keys = KeyValueGenerator::new().random_keys(1_000);
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(keys.len(), 1_000);
        assert_eq!(unique.len(), 1_000);
    }

    #[test]
    fn consecutive_calls_draw_fresh_keys() {
        let generator = KeyValueGenerator::new();
        let first: HashSet<_> = generator.random_keys(64).into_iter().collect();
        let second = generator.random_keys(64);
        assert!(second.iter().all(|k| !first.contains(k)));
    }

    #[test]
    fn zero_keys_is_empty() {
        assert!(KeyValueGenerator::new().random_keys(0).is_empty());
    }

    #[test]
    fn prefix_is_applied() {
        let key = KeyValueGenerator::with_prefix("load:").random_key();
        assert!(key.starts_with("load:"));
        assert_eq!(key.len(), "load:".len() + 36);
    }

    #[test]
    fn value_sizes_stay_in_range() {
        let generator = KeyValueGenerator::new();
        let range = ValueSizeRange::new(3, 17).unwrap();
        for _ in 0..500 {
            assert!(range.contains(generator.random_value(range).len()));
        }
        assert_eq!(generator.random_value(ValueSizeRange::fixed(10)).len(), 10);
        assert!(generator.random_value(ValueSizeRange::fixed(0)).is_empty());
    }
}
