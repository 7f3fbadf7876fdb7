//! Startup synchronization.
//!
//! Brings the stores in line with the served year range when the process
//! boots:
//! 1. Load what the durable tier already has and warm the hot tier from it
//! 2. Flip the readiness flag so reads can be served
//! 3. Fetch missing years and recompute every stored year that was saved
//!    before its season ended, in paced batches
//! 4. Arm the hourly refresh if the current season is still open
//!
//! A failed pass is retried once after a delay; startup never aborts.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;

use crate::error::Result;
use crate::models::{SeasonChampionRecord, SyncConfig};
use crate::pipeline::schedule::RefreshArm;
use crate::services::champions::{Lookup, SeasonChampionsService};
use crate::services::race_winners::RaceWinnersService;
use crate::storage::champion_key;
use crate::utils::log::{format_years, header, sub_item, summary};
use crate::utils::time::{Clock, Sleeper};

/// What one pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Years expected in the store
    pub expected: usize,
    /// Years already stored at the start of the pass
    pub existing: usize,
    /// Years fetched from upstream this pass
    pub fetched: Vec<i32>,
    /// Stored unfinished years that were dropped and recomputed
    pub refreshed: Vec<i32>,
    /// Years still without data after the pass
    pub unavailable: Vec<i32>,
    /// Seasons of race winners copied into the hot tier
    pub warmed_race_seasons: usize,
    /// Whether the current season has yet to finish
    pub current_season_open: bool,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_empty()
    }

    fn log_summary(&self) {
        summary(
            "Startup sync",
            &[
                ("Expected years", self.expected.to_string()),
                ("Already stored", self.existing.to_string()),
                ("Fetched", format_years(&self.fetched)),
                ("Refreshed", format_years(&self.refreshed)),
                ("Unavailable", format_years(&self.unavailable)),
                ("Race seasons warmed", self.warmed_race_seasons.to_string()),
                ("Current season open", self.current_season_open.to_string()),
            ],
        );
    }
}

/// Result of asking for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was in progress; this call did nothing.
    AlreadyRunning,
}

impl SyncOutcome {
    pub fn into_report(self) -> Option<SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::AlreadyRunning => None,
        }
    }
}

/// Resets the running flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct StartupSynchronizer {
    champions: Arc<SeasonChampionsService>,
    race_winners: Arc<RaceWinnersService>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    settings: SyncConfig,
    arm: RefreshArm,
    running: AtomicBool,
    ready: AtomicBool,
}

impl StartupSynchronizer {
    pub fn new(
        champions: Arc<SeasonChampionsService>,
        race_winners: Arc<RaceWinnersService>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        settings: SyncConfig,
        arm: RefreshArm,
    ) -> Self {
        Self {
            champions,
            race_winners,
            clock,
            sleeper,
            settings,
            arm,
            running: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Whether the hot tier has been warmed from durable storage.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Run a pass, then retry once after the configured delay if it failed
    /// or left years unavailable.
    pub async fn run(&self) -> Option<SyncReport> {
        let first = self.run_pass().await;
        let needs_retry = match &first {
            Ok(SyncOutcome::Completed(report)) => !report.is_complete(),
            Ok(SyncOutcome::AlreadyRunning) => false,
            Err(e) => {
                log::error!("Startup sync failed: {}", e);
                true
            }
        };
        if !needs_retry {
            return first.ok().and_then(SyncOutcome::into_report);
        }

        let delay = Duration::from_secs(self.settings.retry_delay_secs);
        log::warn!("Retrying startup sync in {:?}", delay);
        self.sleeper.sleep(delay).await;

        match self.run_pass().await {
            Ok(outcome) => {
                let report = outcome.into_report();
                if let Some(r) = report.as_ref().filter(|r| !r.is_complete()) {
                    log::warn!(
                        "Startup sync retry left {} unavailable; leaving them to later requests",
                        format_years(&r.unavailable)
                    );
                }
                report
            }
            Err(e) => {
                log::error!("Startup sync retry failed: {}", e);
                None
            }
        }
    }

    /// One synchronization pass. Overlapping calls return `AlreadyRunning`.
    pub async fn run_pass(&self) -> Result<SyncOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::info!("Startup sync already running, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = PassGuard(&self.running);

        header("Startup sync");
        let current_year = self.clock.current_year();
        let years = self.champions.served_years();

        let stored: Vec<SeasonChampionRecord> = self
            .champions
            .cache()
            .durable()
            .find_by_partitions(&years)
            .await?;
        let stored_years: HashSet<i32> = stored.iter().map(|c| c.year).collect();
        // A year stored mid-season stays stale until recomputed, even once
        // the calendar has moved past it.
        let stale: Vec<i32> = stored
            .iter()
            .filter(|c| !c.is_season_ended)
            .map(|c| c.year)
            .collect();

        for record in &stored {
            self.champions
                .cache()
                .warm(&champion_key(record.year), std::slice::from_ref(record))
                .await;
        }
        let warmed_race_seasons = self.race_winners.warm_from_durable(&years).await?;
        self.ready.store(true, Ordering::SeqCst);
        log::info!(
            "Warmed {} champions and {} race seasons, serving reads",
            stored.len(),
            warmed_race_seasons
        );

        let missing: Vec<i32> = years
            .iter()
            .copied()
            .filter(|y| !stored_years.contains(y))
            .collect();

        let mut report = SyncReport {
            expected: years.len(),
            existing: stored_years.len(),
            warmed_race_seasons,
            ..SyncReport::default()
        };

        let mut current: Option<SeasonChampionRecord> = stored
            .iter()
            .find(|c| c.year == current_year)
            .cloned();

        let work: Vec<(i32, bool)> = missing
            .iter()
            .map(|&year| (year, false))
            .chain(stale.iter().map(|&year| (year, true)))
            .collect();

        let batch_size = self.settings.batch_size.max(1);
        let batches: Vec<&[(i32, bool)]> = work.chunks(batch_size).collect();
        for (i, batch) in batches.iter().enumerate() {
            let batch_years: Vec<i32> = batch.iter().map(|&(year, _)| year).collect();
            sub_item(&format!("Syncing {}", format_years(&batch_years)));
            let lookups = join_all(batch.iter().map(|&(year, refresh)| async move {
                if refresh {
                    self.champions.refresh_champion(year).await
                } else {
                    self.champions.champion(year).await
                }
            }))
            .await;

            for (&(year, refresh), lookup) in batch.iter().zip(lookups) {
                match lookup? {
                    Lookup::Found(record) => {
                        if refresh {
                            report.refreshed.push(year);
                        } else {
                            report.fetched.push(year);
                        }
                        if year == current_year {
                            current = Some(record);
                        }
                    }
                    Lookup::Unavailable => {
                        if year == current_year {
                            current = None;
                        }
                        report.unavailable.push(year);
                    }
                }
            }

            if i + 1 < batches.len() {
                self.sleeper
                    .sleep(Duration::from_millis(self.settings.batch_delay_ms))
                    .await;
            }
        }

        report.current_season_open = current.is_none_or(|c| !c.is_season_ended);
        self.arm.set(report.current_season_open);

        report.log_summary();
        Ok(SyncOutcome::Completed(report))
    }
}
