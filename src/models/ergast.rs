//! Wire shapes of the Ergast-compatible statistics API.
//!
//! Only the fields this crate reads are modelled. Counters arrive as strings
//! (`"total": "22"`) and are parsed lazily; a value that does not parse is
//! treated the same as a missing one.

use serde::Deserialize;

/// Top-level envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "MRData")]
    pub mr_data: T,
}

/// Paging counter present on every `MRData` object. Requests set their own
/// `limit`/`offset`, so only `total` is read back.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub total: Option<String>,
}

impl Paging {
    pub fn total(&self) -> Option<u32> {
        parse_count(self.total.as_deref())
    }
}

fn parse_count(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

// --- Race results (`/{season}/results/1/` and `/{season}`) ---

#[derive(Debug, Clone, Deserialize)]
pub struct RaceData {
    #[serde(flatten)]
    pub paging: Paging,
    #[serde(rename = "RaceTable")]
    pub race_table: RaceTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceTable {
    #[serde(default)]
    pub season: Option<String>,
    #[serde(rename = "Races")]
    pub races: Vec<Race>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub round: Option<String>,
    pub race_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "Results", default)]
    pub results: Vec<RaceResult>,
}

impl Race {
    /// The classified winner, if the race has one.
    ///
    /// Prefers an explicit position "1"; winner-only queries sometimes omit
    /// the position, in which case the first listed result is taken.
    pub fn winner(&self) -> Option<&RaceResult> {
        self.results
            .iter()
            .find(|r| r.position.as_deref() == Some("1"))
            .or_else(|| self.results.iter().find(|r| r.position.is_none()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceResult {
    #[serde(default)]
    pub position: Option<String>,
    #[serde(rename = "Driver")]
    pub driver: Driver,
    #[serde(rename = "Constructor")]
    pub constructor: Constructor,
    #[serde(default)]
    pub laps: Option<String>,
    #[serde(rename = "Time", default)]
    pub time: Option<RaceTime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub driver_id: String,
    pub given_name: String,
    pub family_name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub permanent_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Constructor {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceTime {
    pub time: String,
}

// --- Driver standings (`/{year}/driverstandings`) ---

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsData {
    #[serde(rename = "StandingsTable")]
    pub standings_table: StandingsTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsTable {
    #[serde(default)]
    pub round: Option<String>,
    #[serde(rename = "StandingsLists", default)]
    pub standings_lists: Vec<StandingsList>,
}

impl StandingsTable {
    /// The most recent standings list.
    pub fn latest(&self) -> Option<&StandingsList> {
        self.standings_lists.last()
    }

    /// Latest completed round reported by the payload.
    pub fn completed_rounds(&self) -> Option<u32> {
        self.latest()
            .and_then(|list| parse_count(list.round.as_deref()))
            .or_else(|| parse_count(self.round.as_deref()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsList {
    #[serde(default)]
    pub round: Option<String>,
    #[serde(rename = "DriverStandings", default)]
    pub driver_standings: Vec<DriverStanding>,
}

impl StandingsList {
    pub fn leader(&self) -> Option<&DriverStanding> {
        self.driver_standings.iter().find(|d| d.position == "1")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverStanding {
    #[serde(default)]
    pub position: String,
    #[serde(rename = "Driver")]
    pub driver: StandingDriver,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingDriver {
    pub given_name: String,
    pub family_name: String,
}

// --- Season metadata (`/{season}`) ---

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonData {
    #[serde(flatten)]
    pub paging: Paging,
}
