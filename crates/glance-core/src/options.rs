//! Tunable thresholds and intervals.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::throttle::{DEFAULT_MIN_FETCH_INTERVAL, RateLimitPolicy};

/// Default low threshold in mg/dL.
pub const DEFAULT_BELOW_RANGE: i32 = 85;
/// Default high threshold in mg/dL.
pub const DEFAULT_ABOVE_RANGE: i32 = 250;
/// Default age after which the current reading is considered stale (11 minutes).
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(11 * 60);
/// Default maximum spacing between the two newest readings for a delta (5.5 minutes).
pub const DEFAULT_DELTA_GAP: Duration = Duration::from_secs(330);
/// Default delay after the newest reading before polling again (5 minutes 20 seconds).
pub const DEFAULT_AUTOMATIC_FETCH_INTERVAL: Duration = Duration::from_secs(5 * 60 + 20);
/// Default delay before re-polling when a fetch brought nothing newer.
pub const DEFAULT_STALE_RETRY_INTERVAL: Duration = Duration::from_secs(60);
/// Default number of readings requested per fetch.
pub const DEFAULT_FETCH_COUNT: usize = 2;
/// Default server-side lookback window in minutes.
pub const DEFAULT_LOOKBACK_MINUTES: u32 = 1440;

/// Thresholds used when deriving display values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    /// Values strictly below this are below range.
    pub below_range: i32,
    /// Values strictly above this are above range.
    pub above_range: i32,
    pub staleness_threshold: Duration,
    pub delta_gap: Duration,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            below_range: DEFAULT_BELOW_RANGE,
            above_range: DEFAULT_ABOVE_RANGE,
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            delta_gap: DEFAULT_DELTA_GAP,
        }
    }
}

/// Polling and rate-limit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    pub automatic_fetch_interval: Duration,
    pub stale_retry_interval: Duration,
    pub min_fetch_interval: Duration,
    pub rate_limit_policy: RateLimitPolicy,
    /// Readings requested per fetch (`maxCount`).
    pub fetch_count: usize,
    /// Server-side lookback window (`minutes`).
    pub lookback_minutes: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            automatic_fetch_interval: DEFAULT_AUTOMATIC_FETCH_INTERVAL,
            stale_retry_interval: DEFAULT_STALE_RETRY_INTERVAL,
            min_fetch_interval: DEFAULT_MIN_FETCH_INTERVAL,
            rate_limit_policy: RateLimitPolicy::default(),
            fetch_count: DEFAULT_FETCH_COUNT,
            lookback_minutes: DEFAULT_LOOKBACK_MINUTES,
        }
    }
}

/// All options consumed by [`GlucoseMonitor`](crate::GlucoseMonitor).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlanceOptions {
    pub display: DisplayOptions,
    pub polling: PollOptions,
}

impl GlanceOptions {
    /// Check that the options describe a usable configuration.
    pub fn validate(&self) -> Result<()> {
        let d = &self.display;
        if d.below_range >= d.above_range {
            return Err(Error::invalid_config(format!(
                "below_range ({}) must be lower than above_range ({})",
                d.below_range, d.above_range
            )));
        }
        if d.staleness_threshold.is_zero() {
            return Err(Error::invalid_config("staleness_threshold must be positive"));
        }

        let p = &self.polling;
        if p.automatic_fetch_interval.is_zero() {
            return Err(Error::invalid_config(
                "automatic_fetch_interval must be positive",
            ));
        }
        if p.stale_retry_interval.is_zero() {
            return Err(Error::invalid_config("stale_retry_interval must be positive"));
        }
        if p.fetch_count == 0 {
            return Err(Error::invalid_config("fetch_count must be at least 1"));
        }
        if p.lookback_minutes == 0 {
            return Err(Error::invalid_config("lookback_minutes must be at least 1"));
        }
        Ok(())
    }
}
