//! Cache backend trait.

use std::time::Duration;

use async_trait::async_trait;

/// Cache backend trait for pluggable cache implementations.
///
/// Implementations must be thread-safe and support concurrent access. A
/// missing or expired key is reported as `None`; backends never surface
/// errors to callers, so a degraded cache costs latency, not availability.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Get a value. `None` on miss or expiry.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: String, ttl: Duration);

    /// List live keys matching a glob pattern (`*` matches any run of
    /// characters).
    async fn keys(&self, pattern: &str) -> Vec<String>;

    /// Delete the given keys in one batch. Returns the number removed.
    /// Deleting absent keys is a no-op.
    async fn delete_many(&self, keys: &[String]) -> u64;

    /// Get cache statistics.
    async fn stats(&self) -> CacheStats;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache (including not-yet-purged
    /// expired entries).
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
