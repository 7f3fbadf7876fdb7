//! Local filesystem durable store.
//!
//! Each partition (season or year) of a collection is one JSON array file,
//! written atomically through a temp file and rename. Read-modify-write cycles
//! are serialized by an in-process lock; the unique key check happens inside
//! that lock, so concurrent inserts of the same record resolve to one
//! `Inserted` and one `Duplicate`.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{DurableStore, InsertOutcome, InsertReport, Record};

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data. A corrupt file is a storage error naming the file.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AppError::storage(key, e)),
            None => Ok(None),
        }
    }

    /// Partition file key for a collection.
    fn partition_key<R: Record>(partition: i32) -> String {
        format!("{}/{}.json", R::COLLECTION, partition)
    }

    async fn load_partition<R: Record>(&self, partition: i32) -> Result<Vec<R>> {
        Ok(self
            .read_json(&Self::partition_key::<R>(partition))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl<R: Record> DurableStore<R> for LocalStore {
    async fn find_by_partitions(&self, partitions: &[i32]) -> Result<Vec<R>> {
        let mut records = Vec::new();
        for partition in partitions {
            records.extend(self.load_partition::<R>(*partition).await?);
        }
        Ok(records)
    }

    async fn insert_many(&self, records: Vec<R>) -> Result<InsertReport> {
        let _guard = self.write_lock.lock().await;

        // Outcomes are reported in input order.
        let mut outcomes = vec![InsertOutcome::Duplicate; records.len()];
        let mut by_partition: BTreeMap<i32, Vec<(usize, R)>> = BTreeMap::new();
        for (i, record) in records.into_iter().enumerate() {
            by_partition
                .entry(record.partition())
                .or_default()
                .push((i, record));
        }

        for (partition, incoming) in by_partition {
            let mut existing: Vec<R> = self.load_partition(partition).await?;
            let mut seen: HashSet<String> = existing.iter().map(Record::unique_key).collect();
            let before = existing.len();

            for (i, record) in incoming {
                if seen.insert(record.unique_key()) {
                    outcomes[i] = InsertOutcome::Inserted;
                    existing.push(record);
                } else {
                    log::debug!(
                        "Ignoring duplicate {} record {}",
                        R::COLLECTION,
                        record.unique_key()
                    );
                }
            }

            if existing.len() != before {
                self.write_json(&Self::partition_key::<R>(partition), &existing)
                    .await?;
            }
        }

        Ok(InsertReport { outcomes })
    }

    async fn delete_one(&self, partition: i32, unique_key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut existing: Vec<R> = self.load_partition(partition).await?;
        let before = existing.len();
        existing.retain(|r| r.unique_key() != unique_key);
        if existing.len() == before {
            return Ok(false);
        }

        let key = Self::partition_key::<R>(partition);
        if existing.is_empty() {
            remove_if_exists(self.path(&key)).await?;
        } else {
            self.write_json(&key, &existing).await?;
        }
        Ok(true)
    }

    async fn delete_many(&self, partition: i32) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let existing: Vec<R> = self.load_partition(partition).await?;
        if existing.is_empty() {
            return Ok(0);
        }
        remove_if_exists(self.path(&Self::partition_key::<R>(partition))).await?;
        Ok(existing.len())
    }
}

async fn remove_if_exists(path: PathBuf) -> Result<()> {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DriverWinRecord, RaceWin, SeasonChampionRecord};
    use tempfile::TempDir;

    fn champion(year: i32, family_name: &str) -> SeasonChampionRecord {
        SeasonChampionRecord {
            year,
            given_name: "Test".to_string(),
            family_name: family_name.to_string(),
            is_season_ended: true,
        }
    }

    fn winner(season: i32, driver_id: &str) -> DriverWinRecord {
        DriverWinRecord {
            driver_id: driver_id.to_string(),
            season,
            given_name: "Test".to_string(),
            family_name: driver_id.to_string(),
            date_of_birth: "1990-01-01".to_string(),
            nationality: "British".to_string(),
            permanent_number: None,
            driver_url: String::new(),
            team_name: "Team".to_string(),
            team_url: String::new(),
            laps: None,
            time: None,
            races: vec![RaceWin {
                race_name: "Test Grand Prix".to_string(),
                race_url: String::new(),
                race_date: format!("{season}-05-01"),
            }],
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.write_bytes("test.txt", b"hello").await.unwrap();
        let data = store.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let data = store.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_insert_then_find_by_partitions() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let report = store
            .insert_many(vec![champion(2021, "Verstappen"), champion(2020, "Hamilton")])
            .await
            .unwrap();
        assert_eq!(report.inserted(), 2);
        assert!(tmp.path().join("champions/2021.json").exists());

        let found: Vec<SeasonChampionRecord> =
            store.find_by_partitions(&[2020, 2021, 2022]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].year, 2020);
    }

    #[tokio::test]
    async fn test_duplicate_insert_keeps_first_copy() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .insert_many(vec![champion(2021, "Verstappen")])
            .await
            .unwrap();
        let report = store
            .insert_many(vec![champion(2021, "Hamilton")])
            .await
            .unwrap();

        assert_eq!(report.outcomes, vec![InsertOutcome::Duplicate]);
        let found: Vec<SeasonChampionRecord> = store.find_by_partitions(&[2021]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].family_name, "Verstappen");
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let report = store
            .insert_many(vec![
                winner(2024, "norris"),
                winner(2024, "norris"),
                winner(2024, "leclerc"),
            ])
            .await
            .unwrap();

        assert_eq!(
            report.outcomes,
            vec![
                InsertOutcome::Inserted,
                InsertOutcome::Duplicate,
                InsertOutcome::Inserted
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_inserts_resolve_to_one_record() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let (a, b) = tokio::join!(
            store.insert_many(vec![champion(2019, "Hamilton")]),
            store.insert_many(vec![champion(2019, "Hamilton")]),
        );
        let total_inserted = a.unwrap().inserted() + b.unwrap().inserted();
        assert_eq!(total_inserted, 1);

        let found: Vec<SeasonChampionRecord> = store.find_by_partitions(&[2019]).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_one_and_many() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .insert_many(vec![winner(2024, "norris"), winner(2024, "leclerc")])
            .await
            .unwrap();

        let removed =
            DurableStore::<DriverWinRecord>::delete_one(&store, 2024, "2024:norris")
                .await
                .unwrap();
        assert!(removed);
        let found: Vec<DriverWinRecord> = store.find_by_partitions(&[2024]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].driver_id, "leclerc");

        let count = DurableStore::<DriverWinRecord>::delete_many(&store, 2024)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(!tmp.path().join("race_winners/2024.json").exists());

        let count = DurableStore::<DriverWinRecord>::delete_many(&store, 2024)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_corrupt_partition_is_storage_error() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store
            .write_bytes("champions/2010.json", b"{not json")
            .await
            .unwrap();

        let result: Result<Vec<SeasonChampionRecord>> = store.find_by_partitions(&[2010]).await;
        assert!(matches!(result, Err(AppError::Storage { .. })));
    }
}
