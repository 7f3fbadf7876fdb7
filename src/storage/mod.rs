//! Storage abstractions for result persistence.
//!
//! Two tiers sit under every read:
//! - Hot: [`HotCache`], fast and volatile, entries carry a TTL and may vanish
//! - Durable: [`DurableStore`], slower and persistent, the source of truth
//!
//! [`TieredCache`] composes both with an upstream loader. The hot tier only
//! ever mirrors what the durable tier holds.
//!
//! ## Durable Layout
//!
//! ```text
//! {data_dir}/
//! ├── champions/            # one record per championship year
//! │   ├── 2005.json
//! │   └── 2024.json
//! └── race_winners/         # one record per (season, driver)
//!     └── 2024.json
//! ```

pub mod local;
pub mod memory;
pub mod tiered;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryHotCache;
pub use tiered::{Resolved, TieredCache};

/// A record the durable tier can file and deduplicate.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection (directory) the record lives in.
    const COLLECTION: &'static str;

    /// Natural key the record is filed under: season or year.
    fn partition(&self) -> i32;

    /// Unique key within the collection; a second insert with the same key
    /// is a duplicate.
    fn unique_key(&self) -> String;
}

/// Outcome of inserting a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same unique key already existed and was kept.
    Duplicate,
}

/// Per-record outcomes of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub outcomes: Vec<InsertOutcome>,
}

impl InsertReport {
    pub fn inserted(&self) -> usize {
        self.count(InsertOutcome::Inserted)
    }

    pub fn duplicates(&self) -> usize {
        self.count(InsertOutcome::Duplicate)
    }

    fn count(&self, outcome: InsertOutcome) -> usize {
        self.outcomes.iter().filter(|o| **o == outcome).count()
    }
}

/// Durable tier for one record type.
#[async_trait]
pub trait DurableStore<R: Record>: Send + Sync {
    /// Load every record filed under any of `partitions`.
    async fn find_by_partitions(&self, partitions: &[i32]) -> Result<Vec<R>>;

    /// Insert records, keeping existing ones on unique-key conflicts.
    async fn insert_many(&self, records: Vec<R>) -> Result<InsertReport>;

    /// Delete one record by unique key. Returns whether it existed.
    async fn delete_one(&self, partition: i32, unique_key: &str) -> Result<bool>;

    /// Delete every record in a partition. Returns how many were removed.
    async fn delete_many(&self, partition: i32) -> Result<usize>;
}

/// Hot tier: a string key-value cache with optional expiry.
#[async_trait]
pub trait HotCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store without expiry.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Store with a time-to-live.
    async fn set_ex(&self, key: &str, ttl: Duration, value: String) -> Result<()>;

    /// Remove a key. Returns whether it was present.
    async fn del(&self, key: &str) -> Result<bool>;
}

/// Hot-tier key for a season's race winners.
pub fn race_winners_key(season: i32) -> String {
    format!("raceWinners:{season}")
}

/// Hot-tier key for a year's champion.
pub fn champion_key(year: i32) -> String {
    format!("season:{year}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_report_counts() {
        let report = InsertReport {
            outcomes: vec![
                InsertOutcome::Inserted,
                InsertOutcome::Duplicate,
                InsertOutcome::Inserted,
            ],
        };
        assert_eq!(report.inserted(), 2);
        assert_eq!(report.duplicates(), 1);
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(race_winners_key(2024), "raceWinners:2024");
        assert_eq!(champion_key(2005), "season:2005");
    }
}
