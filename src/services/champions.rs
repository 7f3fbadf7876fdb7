// src/services/champions.rs

//! Season champions per year.

use std::sync::Arc;

use crate::error::Result;
use crate::models::SeasonChampionRecord;
use crate::pipeline::resolve::SeasonChampionResolver;
use crate::storage::{Resolved, TieredCache, champion_key};
use crate::utils::time::Clock;

/// Result of a single-year lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    /// Nothing stored and the upstream could not provide it.
    Unavailable,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::Unavailable => None,
        }
    }
}

/// Serves [`SeasonChampionRecord`]s through the tiered cache.
pub struct SeasonChampionsService {
    cache: TieredCache<SeasonChampionRecord>,
    resolver: SeasonChampionResolver,
    clock: Arc<dyn Clock>,
    start_year: i32,
}

impl SeasonChampionsService {
    pub fn new(
        cache: TieredCache<SeasonChampionRecord>,
        resolver: SeasonChampionResolver,
        clock: Arc<dyn Clock>,
        start_year: i32,
    ) -> Self {
        Self {
            cache,
            resolver,
            clock,
            start_year,
        }
    }

    pub fn cache(&self) -> &TieredCache<SeasonChampionRecord> {
        &self.cache
    }

    /// Years served: first configured season through the current one.
    pub fn served_years(&self) -> Vec<i32> {
        (self.start_year..=self.clock.current_year()).collect()
    }

    /// Champion of one year.
    pub async fn champion(&self, year: i32) -> Result<Lookup<SeasonChampionRecord>> {
        let resolved = self
            .cache
            .resolve(&champion_key(year), year, || async move {
                self.resolver.resolve(year).await.map(|record| vec![record])
            })
            .await?;
        Ok(into_lookup(year, resolved))
    }

    /// Champions of every served year, ascending. Years with no data
    /// anywhere are left out.
    pub async fn get_season_champions(&self) -> Result<Vec<SeasonChampionRecord>> {
        let mut champions = Vec::new();
        let mut missing = Vec::new();

        for year in self.served_years() {
            match self.champion(year).await? {
                Lookup::Found(record) => champions.push(record),
                Lookup::Unavailable => missing.push(year),
            }
        }

        if !missing.is_empty() {
            log::warn!(
                "Champions unavailable for {}",
                crate::utils::log::format_years(&missing)
            );
        }
        champions.sort_by_key(|c| c.year);
        Ok(champions)
    }

    /// Drop a year from both tiers and resolve it again, skipping the hot
    /// tier so nothing stale can answer.
    pub async fn refresh_champion(&self, year: i32) -> Result<Lookup<SeasonChampionRecord>> {
        log::debug!("Refreshing champion {}", year);
        let resolved = self
            .cache
            .reload(&champion_key(year), year, &year.to_string(), || async move {
                self.resolver.resolve(year).await.map(|record| vec![record])
            })
            .await?;
        Ok(into_lookup(year, resolved))
    }
}

fn into_lookup(year: i32, resolved: Resolved<Vec<SeasonChampionRecord>>) -> Lookup<SeasonChampionRecord> {
    let tier = resolved.tier();
    match resolved.into_option().and_then(|r| r.into_iter().next()) {
        Some(record) => {
            log::debug!("Champion {} served from {}", year, tier);
            Lookup::Found(record)
        }
        None => Lookup::Unavailable,
    }
}
