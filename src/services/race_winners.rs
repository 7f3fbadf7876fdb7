// src/services/race_winners.rs

//! Race winners per season.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::DriverWinRecord;
use crate::services::upstream::UpstreamClient;
use crate::storage::{Resolved, TieredCache, race_winners_key};
use crate::utils::time::Clock;

/// Serves [`DriverWinRecord`]s through the tiered cache.
pub struct RaceWinnersService {
    cache: TieredCache<DriverWinRecord>,
    upstream: Arc<UpstreamClient>,
    clock: Arc<dyn Clock>,
    start_year: i32,
}

impl RaceWinnersService {
    pub fn new(
        cache: TieredCache<DriverWinRecord>,
        upstream: Arc<UpstreamClient>,
        clock: Arc<dyn Clock>,
        start_year: i32,
    ) -> Self {
        Self {
            cache,
            upstream,
            clock,
            start_year,
        }
    }

    /// Winners of `season`, one record per driver.
    ///
    /// Empty when no race has been won yet or nothing could be obtained.
    pub async fn get_race_winners(&self, season: i32) -> Result<Vec<DriverWinRecord>> {
        self.validate_season(season)?;

        let key = race_winners_key(season);
        let resolved = self
            .cache
            .resolve(&key, season, || self.upstream.race_winners(season))
            .await?;

        if let Resolved::NotFound = resolved {
            log::warn!("Race winners for {} unavailable, serving empty list", season);
            return Ok(Vec::new());
        }
        log::debug!("Race winners for {} served from {}", season, resolved.tier());
        Ok(resolved.into_option().unwrap_or_default())
    }

    /// Refetch a season and replace what is stored.
    ///
    /// Existing data is kept when the upstream is unavailable or returns
    /// nothing. Returns whether the stored season was replaced.
    pub async fn refresh_race_winners(&self, season: i32) -> Result<bool> {
        self.validate_season(season)?;

        match self.upstream.race_winners(season).await {
            Some(records) if records.is_empty() => {
                log::info!("No race winners for {} yet, keeping stored data", season);
                Ok(false)
            }
            Some(records) => {
                let drivers = records.len();
                self.cache
                    .replace(&race_winners_key(season), season, records)
                    .await?;
                log::info!("Refreshed race winners for {} ({} drivers)", season, drivers);
                Ok(true)
            }
            None => {
                log::warn!(
                    "Race winners for {} unavailable, keeping stored data",
                    season
                );
                Ok(false)
            }
        }
    }

    /// Copy stored seasons into the hot tier. Returns how many were warmed.
    pub async fn warm_from_durable(&self, seasons: &[i32]) -> Result<usize> {
        let stored = self.cache.durable().find_by_partitions(seasons).await?;

        let mut by_season: BTreeMap<i32, Vec<DriverWinRecord>> = BTreeMap::new();
        for record in stored {
            by_season.entry(record.season).or_default().push(record);
        }

        for (season, records) in &by_season {
            self.cache.warm(&race_winners_key(*season), records).await;
        }
        Ok(by_season.len())
    }

    fn validate_season(&self, season: i32) -> Result<()> {
        validate_season(season, self.start_year, self.clock.current_year())
    }
}

/// Seasons are served from `start_year` through next year's calendar.
pub fn validate_season(season: i32, start_year: i32, current_year: i32) -> Result<()> {
    let max = current_year + 1;
    if season < start_year || season > max {
        return Err(AppError::InvalidSeason {
            season,
            min: start_year,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fetcher::ResilientFetcher;
    use crate::services::rate_limiter::{AdaptiveRateLimiter, RateLimits};
    use crate::storage::{DurableStore, HotCache, LocalStore};
    use crate::testing::{
        BASE_URL, CountingHotCache, FixedClock, RecordingSleeper, ScriptedTransport, payloads, url,
    };
    use crate::utils::http::TransportError;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _tmp: TempDir,
        transport: Arc<ScriptedTransport>,
        hot: Arc<CountingHotCache>,
        durable: Arc<LocalStore>,
        service: RaceWinnersService,
    }

    fn harness() -> Harness {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let hot = Arc::new(CountingHotCache::default());
        let durable = Arc::new(LocalStore::new(tmp.path()));
        let sleeper = Arc::new(RecordingSleeper::default());
        let limiter = Arc::new(AdaptiveRateLimiter::new(RateLimits::default(), sleeper.clone()));
        let upstream = Arc::new(UpstreamClient::new(
            ResilientFetcher::new(transport.clone(), limiter, sleeper, 0),
            BASE_URL,
        ));
        let cache = TieredCache::new(
            hot.clone() as Arc<dyn HotCache>,
            durable.clone() as Arc<dyn DurableStore<DriverWinRecord>>,
            Duration::from_secs(3600),
        );
        let service = RaceWinnersService::new(
            cache,
            upstream,
            Arc::new(FixedClock::at(2024, 6, 1, 12)),
            2005,
        );
        Harness {
            _tmp: tmp,
            transport,
            hot,
            durable,
            service,
        }
    }

    fn season_page(season: i32, winners: &[&str]) -> serde_json::Value {
        let races = winners
            .iter()
            .enumerate()
            .map(|(i, d)| {
                payloads::race(season, i as u32 + 1, vec![payloads::winning_result(d, d, "Team")])
            })
            .collect();
        payloads::results_page(season, races, 0, winners.len())
    }

    #[tokio::test]
    async fn test_miss_fetches_once_then_serves_cache() {
        let h = harness();
        h.transport
            .always_json(url("2023/results/1/"), &season_page(2023, &["verstappen", "perez", "verstappen"]));

        let first = h.service.get_race_winners(2023).await.unwrap();
        let second = h.service.get_race_winners(2023).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(h.transport.calls().len(), 1);
        assert!(h.hot.contains("raceWinners:2023"));
    }

    #[tokio::test]
    async fn test_unavailable_season_is_empty() {
        let h = harness();
        h.transport
            .always(url("2019/results/1/"), Err(TransportError::Status(503)));

        let winners = h.service.get_race_winners(2019).await.unwrap();

        assert!(winners.is_empty());
        assert_eq!(h.hot.writes(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_season_is_rejected() {
        let h = harness();

        let err = h.service.get_race_winners(1999).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSeason { season: 1999, .. }));
        assert!(h.service.get_race_winners(2026).await.is_err());
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_stored_season() {
        let h = harness();
        h.transport
            .push_json(url("2024/results/1/"), &season_page(2024, &["verstappen"]))
            .push_json(url("2024/results/1/"), &season_page(2024, &["verstappen", "norris"]));

        assert_eq!(h.service.get_race_winners(2024).await.unwrap().len(), 1);
        assert!(h.service.refresh_race_winners(2024).await.unwrap());

        let stored: Vec<DriverWinRecord> = h.durable.find_by_partitions(&[2024]).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(h.service.get_race_winners(2024).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_keeps_data_when_upstream_down() {
        let h = harness();
        h.transport
            .push_json(url("2024/results/1/"), &season_page(2024, &["verstappen"]))
            .always(url("2024/results/1/"), Err(TransportError::Network("timeout".into())));

        h.service.get_race_winners(2024).await.unwrap();
        assert!(!h.service.refresh_race_winners(2024).await.unwrap());

        let stored: Vec<DriverWinRecord> = h.durable.find_by_partitions(&[2024]).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_warm_from_durable_fills_hot_tier() {
        let h = harness();
        h.transport
            .always_json(url("2022/results/1/"), &season_page(2022, &["verstappen"]));
        h.service.get_race_winners(2022).await.unwrap();
        h.hot.del("raceWinners:2022").await.unwrap();

        let warmed = h.service.warm_from_durable(&[2021, 2022]).await.unwrap();

        assert_eq!(warmed, 1);
        assert!(h.hot.contains("raceWinners:2022"));
    }
}
