//! Minimum spacing between share-service fetches.
//!
//! The share service locks accounts that poll too aggressively, so every
//! fetch passes through a [`FetchThrottle`] first. What happens when a fetch
//! arrives too early is decided by the [`RateLimitPolicy`]. Hitting the limit
//! is never an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Default minimum interval between two fetches.
pub const DEFAULT_MIN_FETCH_INTERVAL: Duration = Duration::from_secs(5);

/// What to do with a fetch that arrives before the minimum interval elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Sleep out the rest of the interval, then fetch.
    #[default]
    WaitThenFetch,
    /// Answer with the previously fetched readings without touching the network.
    ReturnCached,
}

impl std::fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitThenFetch => write!(f, "wait_then_fetch"),
            Self::ReturnCached => write!(f, "return_cached"),
        }
    }
}

impl std::str::FromStr for RateLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "wait_then_fetch" | "wait" => Ok(Self::WaitThenFetch),
            "return_cached" | "cached" => Ok(Self::ReturnCached),
            other => Err(format!(
                "unknown rate limit policy '{other}' (expected wait_then_fetch or return_cached)"
            )),
        }
    }
}

/// Outcome of [`FetchThrottle::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Go ahead and hit the network.
    Proceed,
    /// Serve the cached readings instead.
    UseCached,
}

/// Tracks when the last fetch went out.
#[derive(Debug, Clone)]
pub struct FetchThrottle {
    min_interval: Duration,
    policy: RateLimitPolicy,
    last_fetch: Option<Instant>,
}

impl Default for FetchThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FETCH_INTERVAL, RateLimitPolicy::default())
    }
}

impl FetchThrottle {
    pub fn new(min_interval: Duration, policy: RateLimitPolicy) -> Self {
        Self {
            min_interval,
            policy,
            last_fetch: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Time left before another fetch is allowed, or `None` if one is allowed now.
    pub fn remaining(&self) -> Option<Duration> {
        let last = self.last_fetch?;
        let remaining = self.min_interval.saturating_sub(last.elapsed());
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Wait for (or refuse) permission to fetch, according to the policy.
    ///
    /// Does not record the fetch; call [`record`](Self::record) once the
    /// request is actually going out.
    pub async fn acquire(&mut self) -> ThrottleDecision {
        let Some(remaining) = self.remaining() else {
            return ThrottleDecision::Proceed;
        };

        match self.policy {
            RateLimitPolicy::WaitThenFetch => {
                debug!("Fetch rate limited, sleeping {:?}", remaining);
                tokio::time::sleep(remaining).await;
                ThrottleDecision::Proceed
            }
            RateLimitPolicy::ReturnCached => {
                debug!("Fetch rate limited, {:?} left; serving cached readings", remaining);
                ThrottleDecision::UseCached
            }
        }
    }

    /// Mark that a fetch is going out now.
    pub fn record(&mut self) {
        self.last_fetch = Some(Instant::now());
    }

    /// Forget fetch history so the next fetch goes out immediately.
    pub fn reset(&mut self) {
        self.last_fetch = None;
    }
}
