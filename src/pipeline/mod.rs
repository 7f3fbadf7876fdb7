//! Data flows built on top of the services.
//!
//! - `aggregate`: fold race results into per-driver win records
//! - `resolve`: decide a year's champion and whether its season is over
//! - `sync`: startup synchronization of the stores
//! - `schedule`: weekly and hourly refresh of the current season

pub mod aggregate;
pub mod resolve;
pub mod schedule;
pub mod sync;

pub use aggregate::RaceWinnerAggregator;
pub use resolve::SeasonChampionResolver;
pub use schedule::{HourlyRun, ManualTrigger, RefreshArm, RefreshScheduler, Trigger};
pub use sync::{StartupSynchronizer, SyncOutcome, SyncReport};
