//! Race winner records.

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// One race won by a driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RaceWin {
    pub race_name: String,
    pub race_url: String,
    pub race_date: String,
}

/// A driver and every race they won in one season.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriverWinRecord {
    /// Natural key of the driver (e.g. "max_verstappen")
    pub driver_id: String,

    pub season: i32,

    pub given_name: String,
    pub family_name: String,
    pub date_of_birth: String,
    pub nationality: String,
    #[serde(default)]
    pub permanent_number: Option<String>,
    pub driver_url: String,

    /// Team of the first win seen this season
    pub team_name: String,
    pub team_url: String,

    /// Laps completed in the first win seen
    #[serde(default)]
    pub laps: Option<String>,

    /// Race time of the first win seen
    #[serde(default)]
    pub time: Option<String>,

    /// Wins in processing order
    pub races: Vec<RaceWin>,
}

impl DriverWinRecord {
    pub fn win_count(&self) -> usize {
        self.races.len()
    }
}

impl Record for DriverWinRecord {
    const COLLECTION: &'static str = "race_winners";

    fn partition(&self) -> i32 {
        self.season
    }

    fn unique_key(&self) -> String {
        format!("{}:{}", self.season, self.driver_id)
    }
}
