//! Key-value cache used for response caching and throttle-rate memoization.
//!
//! Misses are `None`, never errors: a cold or unavailable cache degrades to
//! slower responses, not failures. Keys are flat strings; invalidation works
//! by glob pattern over the key space.

pub mod key;
pub mod memory;
pub mod traits;

pub use key::{glob_match, rate_limit_key, response_cache_key};
pub use memory::InMemoryCache;
pub use traits::{CacheStats, KeyValueCache};
