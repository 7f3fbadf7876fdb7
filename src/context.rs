// src/context.rs

//! Wiring: build every service from a [`Config`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, DriverWinRecord, SeasonChampionRecord};
use crate::pipeline::resolve::SeasonChampionResolver;
use crate::pipeline::schedule::{IntervalTrigger, RefreshArm, RefreshScheduler, Trigger, WeeklyTrigger};
use crate::pipeline::sync::StartupSynchronizer;
use crate::services::champions::SeasonChampionsService;
use crate::services::fetcher::ResilientFetcher;
use crate::services::race_winners::{RaceWinnersService, validate_season};
use crate::services::rate_limiter::{AdaptiveRateLimiter, RateLimits};
use crate::services::upstream::UpstreamClient;
use crate::storage::{DurableStore, HotCache, LocalStore, MemoryHotCache, TieredCache};
use crate::utils::http::{ReqwestTransport, Transport};
use crate::utils::time::{Clock, Sleeper, SystemClock, TokioSleeper};

/// The swappable edges of the system.
pub struct Seams {
    pub transport: Arc<dyn Transport>,
    pub hot: Arc<dyn HotCache>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
}

/// Every long-lived component, built once per process.
pub struct Context {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub upstream: Arc<UpstreamClient>,
    pub race_winners: Arc<RaceWinnersService>,
    pub champions: Arc<SeasonChampionsService>,
    pub synchronizer: Arc<StartupSynchronizer>,
    pub scheduler: Arc<RefreshScheduler>,
}

impl Context {
    /// Production wiring: reqwest, moka, JSON files under
    /// `{storage_dir}/{storage.data_dir}`, system clock.
    pub fn from_config(config: Config, storage_dir: &Path) -> Result<Self> {
        config.validate()?;
        let seams = Seams {
            transport: Arc::new(ReqwestTransport::from_config(&config.upstream)?),
            hot: Arc::new(MemoryHotCache::new(config.cache.max_entries)),
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
        };
        let data_dir = storage_dir.join(&config.storage.data_dir);
        log::debug!("Durable records under {}", data_dir.display());
        Ok(Self::with_seams(config, data_dir, seams))
    }

    pub fn with_seams(config: Config, data_dir: PathBuf, seams: Seams) -> Self {
        let Seams {
            transport,
            hot,
            clock,
            sleeper,
        } = seams;

        // One limiter for the one upstream host.
        let limiter = Arc::new(AdaptiveRateLimiter::new(
            RateLimits::from_config(&config.upstream),
            Arc::clone(&sleeper),
        ));
        let fetcher = ResilientFetcher::new(
            transport,
            limiter,
            Arc::clone(&sleeper),
            config.upstream.max_retries,
        );
        let upstream = Arc::new(UpstreamClient::new(fetcher, config.upstream.base_url.clone()));

        let store = Arc::new(LocalStore::new(data_dir));
        let ttl = config.cache.ttl();
        let start_year = config.sync.start_year;

        let race_winners = Arc::new(RaceWinnersService::new(
            TieredCache::new(
                Arc::clone(&hot),
                Arc::clone(&store) as Arc<dyn DurableStore<DriverWinRecord>>,
                ttl,
            ),
            Arc::clone(&upstream),
            Arc::clone(&clock),
            start_year,
        ));

        let resolver = SeasonChampionResolver::new(
            Arc::clone(&upstream),
            Arc::clone(&clock),
            config.champions.unfinished_season,
        );
        let champions = Arc::new(SeasonChampionsService::new(
            TieredCache::new(
                hot,
                store as Arc<dyn DurableStore<SeasonChampionRecord>>,
                ttl,
            ),
            resolver,
            Arc::clone(&clock),
            start_year,
        ));

        let arm = RefreshArm::default();
        let synchronizer = Arc::new(StartupSynchronizer::new(
            Arc::clone(&champions),
            Arc::clone(&race_winners),
            Arc::clone(&clock),
            sleeper,
            config.sync.clone(),
            arm.clone(),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&race_winners),
            Arc::clone(&champions),
            Arc::clone(&clock),
            arm,
        ));

        Self {
            config: Arc::new(config),
            clock,
            upstream,
            race_winners,
            champions,
            synchronizer,
            scheduler,
        }
    }

    /// Weekly and hourly triggers from the schedule settings.
    pub fn triggers(&self) -> Result<(Box<dyn Trigger>, Box<dyn Trigger>)> {
        let schedule = &self.config.schedule;
        let weekly = WeeklyTrigger::new(
            schedule.weekday()?,
            schedule.weekly_hour,
            Arc::clone(&self.clock),
        );
        let hourly = IntervalTrigger::new(schedule.hourly_interval());
        Ok((Box::new(weekly), Box::new(hourly)))
    }

    /// Total races scheduled in `season`, if the upstream can say.
    pub async fn season_race_count(&self, season: i32) -> Result<Option<u32>> {
        validate_season(season, self.config.sync.start_year, self.clock.current_year())?;
        Ok(self.upstream.season_race_count(season).await)
    }
}
