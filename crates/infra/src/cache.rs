//! Query cache backed by moka
//!
//! Holds the JSON values the UI renders, keyed by [`CacheKey`]. Entries
//! expire after an optional TTL and the cache is bounded by entry count.
//! Invalidation removes the entry so the next read misses and the caller
//! refetches.

use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use serde_json::Value;
use tracing::debug;
use versesync_core::CacheStore;
use versesync_domain::CacheKey;

/// Default max capacity (entries)
pub const DEFAULT_CACHE_MAX_CAPACITY: u64 = 1000;

/// Default time-to-live (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MokaCacheConfig {
    pub max_capacity: u64,
    /// `None` keeps entries until evicted by capacity
    pub ttl: Option<Duration>,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self { max_capacity: DEFAULT_CACHE_MAX_CAPACITY, ttl: Some(DEFAULT_CACHE_TTL) }
    }
}

#[derive(Clone)]
pub struct MokaCacheStore {
    cache: Cache<CacheKey, Value>,
}

impl MokaCacheStore {
    pub fn new(config: &MokaCacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        Self { cache: builder.build() }
    }

    /// Number of live entries (approximate until pending work runs)
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl Default for MokaCacheStore {
    fn default() -> Self {
        Self::new(&MokaCacheConfig::default())
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.cache.get(key)
    }

    fn set(&self, key: &CacheKey, value: Value) {
        self.cache.insert(key.clone(), value);
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key);
        debug!(cache_key = %key, "Cache entry invalidated");
    }
}
