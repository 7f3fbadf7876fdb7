// src/services/upstream.rs

//! Typed access to the Ergast-compatible endpoints.

use crate::models::DriverWinRecord;
use crate::models::ergast::{Envelope, RaceData, SeasonData, StandingsData, StandingsTable};
use crate::pipeline::aggregate::RaceWinnerAggregator;
use crate::services::fetcher::ResilientFetcher;
use crate::utils::endpoint;

/// Page size for result listings.
const PAGE_SIZE: u32 = 100;

/// Stop paginating after this many pages even if the counters disagree.
const MAX_PAGES: u32 = 20;

/// Endpoint URLs plus decoding on top of the fetcher.
#[derive(Clone)]
pub struct UpstreamClient {
    fetcher: ResilientFetcher,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Race winners of a season, one record per driver.
    ///
    /// `None` if any page is unavailable; a partial season is never returned.
    pub async fn race_winners(&self, season: i32) -> Option<Vec<DriverWinRecord>> {
        let mut aggregator = RaceWinnerAggregator::new(season);
        let mut offset = 0u32;

        for _ in 0..MAX_PAGES {
            let url = endpoint(
                &self.base_url,
                &format!("{season}/results/1/?limit={PAGE_SIZE}&offset={offset}"),
            );
            let page: Envelope<RaceData> = self.fetcher.fetch_as(&url).await?;
            let data = page.mr_data;

            let count = data.race_table.races.len() as u32;
            aggregator.add_races(&data.race_table.races);
            offset += count;

            let total = data.paging.total().unwrap_or(0);
            if count == 0 || offset >= total {
                break;
            }
        }

        log::debug!(
            "Season {}: {} races with results fetched",
            season,
            aggregator.races_seen()
        );
        Some(aggregator.finish())
    }

    /// Driver standings after the latest completed round.
    pub async fn driver_standings(&self, year: i32) -> Option<StandingsTable> {
        let url = endpoint(&self.base_url, &format!("{year}/driverstandings"));
        let page: Envelope<StandingsData> = self.fetcher.fetch_as(&url).await?;
        Some(page.mr_data.standings_table)
    }

    /// Number of races scheduled in a season.
    pub async fn season_race_count(&self, season: i32) -> Option<u32> {
        let url = endpoint(&self.base_url, &season.to_string());
        let page: Envelope<SeasonData> = self.fetcher.fetch_as(&url).await?;
        let total = page.mr_data.paging.total();
        if total.is_none() {
            log::warn!("Season {} listing carries no race total", season);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_limiter::{AdaptiveRateLimiter, RateLimits};
    use crate::testing::{BASE_URL, RecordingSleeper, ScriptedTransport, payloads, url};
    use crate::utils::http::TransportError;
    use std::sync::Arc;

    fn client(transport: Arc<ScriptedTransport>) -> UpstreamClient {
        let sleeper = Arc::new(RecordingSleeper::default());
        let limiter = Arc::new(AdaptiveRateLimiter::new(
            RateLimits::default(),
            sleeper.clone(),
        ));
        UpstreamClient::new(
            ResilientFetcher::new(transport, limiter, sleeper, 1),
            BASE_URL,
        )
    }

    fn win(round: u32, driver: &str) -> serde_json::Value {
        payloads::race(2023, round, vec![payloads::winning_result(driver, driver, "Team")])
    }

    #[tokio::test]
    async fn test_race_winners_follows_offsets() {
        let transport = Arc::new(ScriptedTransport::new());
        let first: Vec<_> = (1..=100).map(|r| win(r, "verstappen")).collect();
        transport
            .push_json(
                url("2023/results/1/?limit=100&offset=0"),
                &payloads::results_page(2023, first, 0, 102),
            )
            .push_json(
                url("2023/results/1/?limit=100&offset=100"),
                &payloads::results_page(2023, vec![win(101, "perez"), win(102, "verstappen")], 100, 102),
            );

        let records = client(transport.clone()).race_winners(2023).await.unwrap();

        assert_eq!(transport.calls().len(), 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].win_count(), 101);
        assert_eq!(records[1].driver_id, "perez");
    }

    #[tokio::test]
    async fn test_missing_page_makes_season_unavailable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json(
                url("2023/results/1/?limit=100&offset=0"),
                &payloads::results_page(2023, vec![win(1, "verstappen")], 0, 150),
            )
            .always(
                url("2023/results/1/?limit=100&offset=1"),
                Err(TransportError::Status(502)),
            );

        assert!(client(transport).race_winners(2023).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_season_is_empty_not_unavailable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(
            url("2026/results/1/"),
            &payloads::results_page(2026, Vec::new(), 0, 0),
        );

        let records = client(transport).race_winners(2026).await;
        assert_eq!(records, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_season_race_count_reads_total() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(url("2024"), &payloads::season(24));

        assert_eq!(client(transport).season_race_count(2024).await, Some(24));
    }

    #[tokio::test]
    async fn test_malformed_standings_are_unavailable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.always_json(url("2024/driverstandings"), &serde_json::json!({"MRData": {}}));

        assert!(client(transport).driver_standings(2024).await.is_none());
    }
}
