//! Cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1024;

/// Cache configuration from `bookstore.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every lookup computes and nothing is stored.
    pub enabled: bool,
    /// Maximum number of cached payloads before LRU eviction.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity, 1024);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
