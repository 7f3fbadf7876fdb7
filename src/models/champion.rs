//! Season champion record.

use serde::{Deserialize, Serialize};

use crate::storage::Record;

/// Champion of one championship year.
///
/// While a season is still running the name fields may be blank placeholders,
/// depending on the configured `UnfinishedSeasonPolicy`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonChampionRecord {
    /// Championship year
    #[serde(rename = "season")]
    pub year: i32,

    /// Champion given name (blank while unfinished)
    pub given_name: String,

    /// Champion family name (blank while unfinished)
    pub family_name: String,

    /// Whether every scheduled round has been run
    pub is_season_ended: bool,
}

impl SeasonChampionRecord {
    /// Full display name, empty for placeholders.
    pub fn champion_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
            .trim()
            .to_string()
    }

    /// Whether the record carries placeholder names.
    pub fn is_placeholder(&self) -> bool {
        self.given_name.is_empty() && self.family_name.is_empty()
    }
}

impl Record for SeasonChampionRecord {
    const COLLECTION: &'static str = "champions";

    fn partition(&self) -> i32 {
        self.year
    }

    fn unique_key(&self) -> String {
        self.year.to_string()
    }
}
