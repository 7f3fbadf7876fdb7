//! Decide who won a championship year, and whether it is over yet.

use std::sync::Arc;

use crate::models::ergast::StandingsList;
use crate::models::{SeasonChampionRecord, UnfinishedSeasonPolicy};
use crate::services::upstream::UpstreamClient;
use crate::utils::time::Clock;

/// Whether a season has run all its rounds.
///
/// Past years are always over. For the current (or a future) year both counts
/// must be known and the completed rounds must reach the scheduled total.
pub fn is_season_ended(
    year: i32,
    current_year: i32,
    completed_rounds: Option<u32>,
    scheduled_rounds: Option<u32>,
) -> bool {
    if year < current_year {
        return true;
    }
    match (completed_rounds, scheduled_rounds) {
        (Some(completed), Some(total)) if total > 0 => completed >= total,
        _ => false,
    }
}

/// Builds [`SeasonChampionRecord`]s from standings.
pub struct SeasonChampionResolver {
    upstream: Arc<UpstreamClient>,
    clock: Arc<dyn Clock>,
    policy: UnfinishedSeasonPolicy,
}

impl SeasonChampionResolver {
    pub fn new(
        upstream: Arc<UpstreamClient>,
        clock: Arc<dyn Clock>,
        policy: UnfinishedSeasonPolicy,
    ) -> Self {
        Self {
            upstream,
            clock,
            policy,
        }
    }

    /// Resolve one year. `None` when the upstream has no usable standings.
    pub async fn resolve(&self, year: i32) -> Option<SeasonChampionRecord> {
        let Some(standings) = self.upstream.driver_standings(year).await else {
            log::warn!("Standings for {} unavailable", year);
            return None;
        };

        let Some(leader) = standings.latest().and_then(StandingsList::leader) else {
            log::info!("No championship leader for {} yet", year);
            return None;
        };

        let current_year = self.clock.current_year();
        let ended = if year < current_year {
            true
        } else {
            let completed = standings.completed_rounds();
            let scheduled = self.upstream.season_race_count(year).await;
            log::debug!(
                "Season {}: {:?} of {:?} rounds completed",
                year,
                completed,
                scheduled
            );
            is_season_ended(year, current_year, completed, scheduled)
        };

        let publish_names = ended || self.policy == UnfinishedSeasonPolicy::ProvisionalLeader;
        let (given_name, family_name) = if publish_names {
            (
                leader.driver.given_name.clone(),
                leader.driver.family_name.clone(),
            )
        } else {
            (String::new(), String::new())
        };

        Some(SeasonChampionRecord {
            year,
            given_name,
            family_name,
            is_season_ended: ended,
        })
    }
}
