//! Paced, retrying JSON GETs.
//!
//! Every failure mode of the upstream ends in `None` ("unavailable"); callers
//! never see a retryable error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::services::rate_limiter::AdaptiveRateLimiter;
use crate::utils::http::{Transport, TransportError};
use crate::utils::time::Sleeper;

const RATE_LIMIT_BASE_MS: u64 = 2500;
const RATE_LIMIT_JITTER_MS: u64 = 2000;
const RATE_LIMIT_CAP: Duration = Duration::from_secs(30);

const ERROR_BASE_MS: u64 = 500;
const ERROR_JITTER_MS: u64 = 500;
const ERROR_CAP: Duration = Duration::from_secs(8);

/// Why one attempt failed.
#[derive(Debug)]
enum Failure {
    RateLimited,
    Other(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited (HTTP 429)"),
            Self::Other(cause) => write!(f, "{cause}"),
        }
    }
}

/// Backoff before the next attempt.
///
/// `attempt` is 1 for the first failure. Rate limiting backs off harder than
/// other errors.
pub(crate) fn backoff_delay(rate_limited: bool, attempt: u32, jitter_ms: u64) -> Duration {
    let (base, cap) = if rate_limited {
        (RATE_LIMIT_BASE_MS, RATE_LIMIT_CAP)
    } else {
        (ERROR_BASE_MS, ERROR_CAP)
    };
    let exp = 2u64.saturating_pow(attempt).saturating_mul(base);
    Duration::from_millis(exp.saturating_add(jitter_ms)).min(cap)
}

fn jitter(rate_limited: bool) -> u64 {
    let max = if rate_limited {
        RATE_LIMIT_JITTER_MS
    } else {
        ERROR_JITTER_MS
    };
    rand::rng().random_range(0..max)
}

/// Upstream GETs through a shared limiter with bounded retries.
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<AdaptiveRateLimiter>,
    sleeper: Arc<dyn Sleeper>,
    max_retries: u32,
}

impl ResilientFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<AdaptiveRateLimiter>,
        sleeper: Arc<dyn Sleeper>,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            limiter,
            sleeper,
            max_retries,
        }
    }

    pub fn limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.limiter
    }

    /// GET `url` with the configured retry budget.
    pub async fn fetch(&self, url: &str) -> Option<Value> {
        self.fetch_with_retries(url, self.max_retries).await
    }

    /// GET `url`, retrying up to `max_retries` times after the first attempt.
    pub async fn fetch_with_retries(&self, url: &str, max_retries: u32) -> Option<Value> {
        let mut remaining = max_retries;

        loop {
            let attempt = max_retries - remaining + 1;
            self.limiter.wait_if_needed().await;

            let failure = match self.transport.get_text(url).await {
                Ok(body) => match serde_json::from_str::<Value>(&body) {
                    Ok(value) => {
                        self.limiter.on_successful_request().await;
                        if attempt > 1 {
                            log::debug!("{} succeeded on attempt {}", url, attempt);
                        }
                        return Some(value);
                    }
                    Err(e) => Failure::Other(format!("invalid JSON body: {e}")),
                },
                Err(TransportError::RateLimited) => {
                    self.limiter.on_rate_limit_hit().await;
                    Failure::RateLimited
                }
                Err(e) => Failure::Other(e.to_string()),
            };

            if remaining == 0 {
                log::warn!(
                    "GET {} failed (attempt {}/{}): {}. Giving up",
                    url,
                    attempt,
                    max_retries + 1,
                    failure
                );
                return None;
            }

            let rate_limited = matches!(failure, Failure::RateLimited);
            let delay = backoff_delay(rate_limited, attempt, jitter(rate_limited));
            log::warn!(
                "GET {} failed (attempt {}/{}): {}. Retrying in {:?}",
                url,
                attempt,
                max_retries + 1,
                failure,
                delay
            );
            self.sleeper.sleep(delay).await;
            remaining -= 1;
        }
    }

    /// GET and decode into `T`. A payload of the wrong shape is unavailable.
    pub async fn fetch_as<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let value = self.fetch(url).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::warn!("Unexpected payload shape from {}: {}", url, e);
                None
            }
        }
    }
}
