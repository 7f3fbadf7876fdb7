//! Service layer for the results cache.
//!
//! This module contains the business logic for:
//! - Upstream pacing (`AdaptiveRateLimiter`) and retries (`ResilientFetcher`)
//! - Endpoint access and decoding (`UpstreamClient`)
//! - Race winners per season (`RaceWinnersService`)
//! - Season champions per year (`SeasonChampionsService`)

pub mod champions;
pub mod fetcher;
pub mod race_winners;
pub mod rate_limiter;
pub mod upstream;

pub use champions::{Lookup, SeasonChampionsService};
pub use fetcher::ResilientFetcher;
pub use race_winners::RaceWinnersService;
pub use rate_limiter::{AdaptiveRateLimiter, RateLimits};
pub use upstream::UpstreamClient;
