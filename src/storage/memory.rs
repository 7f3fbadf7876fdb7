//! In-memory hot tier using moka.
//!
//! Entries carry their own time-to-live so `set` and `set_ex` can share one
//! cache. Capacity is bounded; moka evicts on its own when it fills up, which
//! is fine because every hot entry can be rebuilt from the durable tier.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;

use crate::error::Result;
use crate::storage::HotCache;

#[derive(Debug, Clone)]
struct HotEntry {
    value: String,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, HotEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &HotEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &HotEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// Process-local hot cache.
pub struct MemoryHotCache {
    cache: MokaCache<String, HotEntry>,
}

impl MemoryHotCache {
    /// Create a cache holding at most `max_entries` keys.
    pub fn new(max_entries: u64) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) {
        self.cache
            .insert(key.to_string(), HotEntry { value, ttl })
            .await;
    }
}

#[async_trait]
impl HotCache for MemoryHotCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.put(key, value, None).await;
        Ok(())
    }

    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<()> {
        self.put(key, value, Some(ttl)).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.cache.remove(key).await.is_some())
    }
}
