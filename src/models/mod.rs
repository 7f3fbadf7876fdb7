// src/models/mod.rs

//! Domain models for the results cache.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod champion;
mod config;
pub mod ergast;
mod winner;

// Re-export all public types
pub use champion::SeasonChampionRecord;
pub use config::{
    CacheConfig, ChampionsConfig, Config, LoggingConfig, ScheduleConfig, StorageConfig,
    SyncConfig, UnfinishedSeasonPolicy, UpstreamConfig,
};
pub use winner::{DriverWinRecord, RaceWin};
