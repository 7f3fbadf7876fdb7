//! Hot → durable → upstream read-through.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::Result;
use crate::storage::{DurableStore, HotCache, Record};

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Hot(T),
    Durable(T),
    Upstream(T),
    /// Nothing stored and the upstream was unavailable.
    NotFound,
}

impl<T> Resolved<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hot(v) | Self::Durable(v) | Self::Upstream(v) => Some(v),
            Self::NotFound => None,
        }
    }

    /// Short tier name for log lines.
    pub fn tier(&self) -> &'static str {
        match self {
            Self::Hot(_) => "hot",
            Self::Durable(_) => "durable",
            Self::Upstream(_) => "upstream",
            Self::NotFound => "none",
        }
    }
}

/// Read-through cache over one record type.
///
/// Reads try the hot tier, then the durable tier (backfilling hot), then the
/// caller's upstream loader (persisting to both tiers). The hot tier never
/// holds anything the durable tier does not.
///
/// Every durable delete bumps `epoch` before touching either tier. A backfill
/// spawned under an older epoch never lands, or removes what it wrote.
pub struct TieredCache<R: Record> {
    hot: Arc<dyn HotCache>,
    durable: Arc<dyn DurableStore<R>>,
    ttl: Duration,
    epoch: Arc<AtomicU64>,
}

impl<R: Record> Clone for TieredCache<R> {
    fn clone(&self) -> Self {
        Self {
            hot: Arc::clone(&self.hot),
            durable: Arc::clone(&self.durable),
            ttl: self.ttl,
            epoch: Arc::clone(&self.epoch),
        }
    }
}

impl<R: Record> TieredCache<R> {
    pub fn new(hot: Arc<dyn HotCache>, durable: Arc<dyn DurableStore<R>>, ttl: Duration) -> Self {
        Self {
            hot,
            durable,
            ttl,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn durable(&self) -> &Arc<dyn DurableStore<R>> {
        &self.durable
    }

    /// Resolve `key` (filed under `partition`) through the tiers.
    ///
    /// `load` is only called on a miss in both tiers. It returns `None` when
    /// the upstream is unavailable. An empty upstream result is returned but
    /// not stored.
    pub async fn resolve<F, Fut>(&self, key: &str, partition: i32, load: F) -> Result<Resolved<Vec<R>>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Option<Vec<R>>> + Send,
    {
        if let Some(records) = self.read_hot(key).await {
            log::debug!("Hot hit for {}", key);
            return Ok(Resolved::Hot(records));
        }
        self.resolve_cold(key, partition, load).await
    }

    /// Delete one durable record, drop `key` from hot, then resolve again
    /// without consulting the hot tier.
    pub async fn reload<F, Fut>(
        &self,
        key: &str,
        partition: i32,
        unique_key: &str,
        load: F,
    ) -> Result<Resolved<Vec<R>>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Option<Vec<R>>> + Send,
    {
        let removed = self.invalidate_one(key, partition, unique_key).await?;
        log::debug!("Reloading {} (stored record removed: {})", key, removed);
        self.resolve_cold(key, partition, load).await
    }

    async fn resolve_cold<F, Fut>(&self, key: &str, partition: i32, load: F) -> Result<Resolved<Vec<R>>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Option<Vec<R>>> + Send,
    {
        let stored = self.durable.find_by_partitions(&[partition]).await?;
        if !stored.is_empty() {
            log::debug!("Durable hit for {} ({} records)", key, stored.len());
            self.spawn_backfill(key, &stored);
            return Ok(Resolved::Durable(stored));
        }

        match load().await {
            Some(records) if records.is_empty() => {
                log::debug!("Upstream returned nothing for {}, not caching", key);
                Ok(Resolved::Upstream(records))
            }
            Some(records) => {
                let published = self.persist(key, partition, records).await?;
                Ok(Resolved::Upstream(published))
            }
            None => Ok(Resolved::NotFound),
        }
    }

    /// Replace a partition wholesale with fresh records.
    pub async fn replace(&self, key: &str, partition: i32, records: Vec<R>) -> Result<()> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let removed = self.durable.delete_many(partition).await?;
        log::debug!("Replacing {} ({} stored records removed)", key, removed);

        if records.is_empty() {
            self.drop_hot(key).await;
            return Ok(());
        }
        self.persist(key, partition, records).await?;
        Ok(())
    }

    /// Remove one record from the durable tier, then `key` from the hot tier.
    pub async fn invalidate_one(&self, key: &str, partition: i32, unique_key: &str) -> Result<bool> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let removed = self.durable.delete_one(partition, unique_key).await?;
        self.drop_hot(key).await;
        Ok(removed)
    }

    /// Write records already known to be durable into the hot tier.
    pub async fn warm(&self, key: &str, records: &[R]) {
        let Some(json) = encode(key, records) else {
            return;
        };
        if let Err(e) = self.hot.set_ex(key, self.ttl, json).await {
            log::warn!("Hot write failed for {}: {}", key, e);
        }
    }

    /// Insert into the durable tier, then mirror the durable state into hot.
    ///
    /// On unique-key conflicts the stored records win, so the durable tier is
    /// re-read and that is what gets published.
    async fn persist(&self, key: &str, partition: i32, records: Vec<R>) -> Result<Vec<R>> {
        let report = self.durable.insert_many(records.clone()).await?;

        let published = if report.duplicates() > 0 {
            log::debug!(
                "{} duplicate records for {}, publishing stored copy",
                report.duplicates(),
                key
            );
            let stored = self.durable.find_by_partitions(&[partition]).await?;
            if stored.is_empty() { records } else { stored }
        } else {
            records
        };

        self.warm(key, &published).await;
        Ok(published)
    }

    async fn read_hot(&self, key: &str) -> Option<Vec<R>> {
        let raw = match self.hot.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Hot read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                log::warn!("Discarding undecodable hot entry {}: {}", key, e);
                None
            }
        }
    }

    async fn drop_hot(&self, key: &str) {
        if let Err(e) = self.hot.del(key).await {
            log::warn!("Hot delete failed for {}: {}", key, e);
        }
    }

    fn spawn_backfill(&self, key: &str, records: &[R]) {
        let Some(json) = encode(key, records) else {
            return;
        };
        let hot = Arc::clone(&self.hot);
        let epoch = Arc::clone(&self.epoch);
        let seen = epoch.load(Ordering::SeqCst);
        let key = key.to_string();
        let ttl = self.ttl;
        tokio::spawn(async move {
            if epoch.load(Ordering::SeqCst) != seen {
                log::debug!("Skipping backfill of {}, invalidated since read", key);
                return;
            }
            if let Err(e) = hot.set_ex(&key, ttl, json).await {
                log::warn!("Hot backfill failed for {}: {}", key, e);
                return;
            }
            if epoch.load(Ordering::SeqCst) != seen {
                // Raced an invalidation; a miss is always safe.
                if let Err(e) = hot.del(&key).await {
                    log::warn!("Hot delete failed for {}: {}", key, e);
                }
            }
        });
    }
}

fn encode<R: Record>(key: &str, records: &[R]) -> Option<String> {
    match serde_json::to_string(records) {
        Ok(json) => Some(json),
        Err(e) => {
            log::warn!("Cannot encode {} for hot tier: {}", key, e);
            None
        }
    }
}
