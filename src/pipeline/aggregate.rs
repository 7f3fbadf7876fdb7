//! Fold race results into one record per winning driver.

use std::collections::HashMap;

use crate::models::ergast::{Race, RaceResult};
use crate::models::{DriverWinRecord, RaceWin};

/// Builds per-driver win records for one season.
///
/// Races are fed page by page with [`add_races`](Self::add_races); records
/// come out in the order their driver first won.
#[derive(Debug)]
pub struct RaceWinnerAggregator {
    season: i32,
    records: Vec<DriverWinRecord>,
    by_driver: HashMap<String, usize>,
    races_seen: usize,
    races_without_winner: usize,
}

impl RaceWinnerAggregator {
    pub fn new(season: i32) -> Self {
        Self {
            season,
            records: Vec::new(),
            by_driver: HashMap::new(),
            races_seen: 0,
            races_without_winner: 0,
        }
    }

    pub fn add_races(&mut self, races: &[Race]) {
        for race in races {
            self.add_race(race);
        }
    }

    pub fn add_race(&mut self, race: &Race) {
        self.races_seen += 1;

        let Some(winner) = race.winner() else {
            self.races_without_winner += 1;
            log::debug!("{} {} has no classified winner", self.season, race.race_name);
            return;
        };

        let win = RaceWin {
            race_name: race.race_name.clone(),
            race_url: race.url.clone(),
            race_date: race.date.clone(),
        };

        match self.by_driver.get(&winner.driver.driver_id) {
            Some(&i) => self.records[i].races.push(win),
            None => {
                let record = self.seed(winner, win);
                self.by_driver
                    .insert(record.driver_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn races_seen(&self) -> usize {
        self.races_seen
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self) -> Vec<DriverWinRecord> {
        if self.races_without_winner > 0 {
            log::debug!(
                "Season {}: skipped {} of {} races without a winner",
                self.season,
                self.races_without_winner,
                self.races_seen
            );
        }
        self.records
    }

    fn seed(&self, result: &RaceResult, first_win: RaceWin) -> DriverWinRecord {
        let driver = &result.driver;
        DriverWinRecord {
            driver_id: driver.driver_id.clone(),
            season: self.season,
            given_name: driver.given_name.clone(),
            family_name: driver.family_name.clone(),
            date_of_birth: driver.date_of_birth.clone(),
            nationality: driver.nationality.clone(),
            permanent_number: driver.permanent_number.clone(),
            driver_url: driver.url.clone(),
            team_name: result.constructor.name.clone(),
            team_url: result.constructor.url.clone(),
            laps: result.laps.clone(),
            time: result.time.as_ref().map(|t| t.time.clone()),
            races: vec![first_win],
        }
    }
}
