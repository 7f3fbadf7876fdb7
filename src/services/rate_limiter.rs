//! Adaptive request spacing for one upstream host.
//!
//! Spacing starts at the configured initial value, doubles on every 429 up to
//! a ceiling, and decays back towards a floor once requests succeed again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::UpstreamConfig;
use crate::utils::time::Sleeper;

/// Spacing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub initial: Duration,
    pub floor: Duration,
    pub ceiling: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(2000),
            floor: Duration::from_millis(1500),
            ceiling: Duration::from_millis(10_000),
        }
    }
}

impl RateLimits {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_spacing_ms),
            floor: Duration::from_millis(config.min_spacing_ms),
            ceiling: Duration::from_millis(config.max_spacing_ms),
        }
    }
}

struct LimiterState {
    min_spacing: Duration,
    consecutive_hits: u32,
    last_permitted: Option<Instant>,
}

/// Shared pacing state. Construct once per upstream and hand out `Arc`s.
pub struct AdaptiveRateLimiter {
    limits: RateLimits,
    state: Mutex<LimiterState>,
    sleeper: Arc<dyn Sleeper>,
}

impl AdaptiveRateLimiter {
    pub fn new(limits: RateLimits, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            limits,
            state: Mutex::new(LimiterState {
                min_spacing: limits.initial,
                consecutive_hits: 0,
                last_permitted: None,
            }),
            sleeper,
        }
    }

    /// Reserve the next slot one spacing after the last permitted call and
    /// sleep until it.
    ///
    /// Slots are handed out under the lock but the sleep happens outside it,
    /// so concurrent callers still queue up one spacing apart while a 429
    /// reported in the meantime widens every slot reserved after it.
    pub async fn wait_if_needed(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = match state.last_permitted {
                Some(last) => (last + state.min_spacing).max(now),
                None => now,
            };
            state.last_permitted = Some(slot);
            slot - now
        };

        if !wait.is_zero() {
            log::debug!("Rate limiter waiting {:?}", wait);
            self.sleeper.sleep(wait).await;
        }
    }

    /// Back off after an HTTP 429.
    pub async fn on_rate_limit_hit(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_hits += 1;
        state.min_spacing = (state.min_spacing * 2).min(self.limits.ceiling);
        log::warn!(
            "Rate limited {} time(s) in a row, spacing now {:?}",
            state.consecutive_hits,
            state.min_spacing
        );
    }

    /// Relax after a successful request.
    pub async fn on_successful_request(&self) {
        let mut state = self.state.lock().await;
        if state.consecutive_hits > 0 {
            state.min_spacing = (state.min_spacing * 4 / 5).max(self.limits.floor);
            log::debug!("Rate limit cleared, spacing now {:?}", state.min_spacing);
        }
        state.consecutive_hits = 0;
    }

    pub async fn spacing(&self) -> Duration {
        self.state.lock().await.min_spacing
    }

    pub async fn consecutive_hits(&self) -> u32 {
        self.state.lock().await.consecutive_hits
    }
}
