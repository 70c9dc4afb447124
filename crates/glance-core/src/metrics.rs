//! Values derived from the reading collection for display.

use std::time::Duration;

use time::OffsetDateTime;

use glance_types::Reading;

use crate::options::DisplayOptions;
use crate::range::RangeBand;

/// Shown instead of the age once the current reading is stale.
pub const STALE_AGE_TEXT: &str = "OLD";

/// Snapshot of everything a glanceable display needs, computed at `now`.
///
/// ```
/// use glance_core::{DisplayOptions, GlanceMetrics};
///
/// let metrics = GlanceMetrics::compute(&[], time::OffsetDateTime::now_utc(), &DisplayOptions::default());
/// assert!(metrics.is_stale());
/// assert_eq!(metrics.value_string(), "100");
/// assert_eq!(metrics.delta_string(), "");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GlanceMetrics {
    current: Reading,
    delta: Option<i32>,
    age: Duration,
    is_stale: bool,
    staleness_fraction: f64,
    band: RangeBand,
}

impl GlanceMetrics {
    /// Derive display values from a newest-first collection.
    pub fn compute(readings: &[Reading], now: OffsetDateTime, options: &DisplayOptions) -> Self {
        let current = current_reading(readings);
        let age = age_of(&current, now);
        Self {
            current,
            delta: delta(readings, options.delta_gap),
            age,
            is_stale: is_stale(&current, now, options.staleness_threshold),
            staleness_fraction: staleness_fraction(age, options.staleness_threshold),
            band: RangeBand::for_value(current.value(), options),
        }
    }

    /// The newest reading, or the placeholder when there are none.
    pub fn current_reading(&self) -> Reading {
        self.current
    }

    pub fn delta(&self) -> Option<i32> {
        self.delta
    }

    /// Time since the current reading. Zero for readings dated in the future.
    pub fn age(&self) -> Duration {
        self.age
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    /// Age as a fraction of the staleness threshold, clamped to `[0, 1]`.
    pub fn staleness_fraction(&self) -> f64 {
        self.staleness_fraction
    }

    pub fn band(&self) -> RangeBand {
        self.band
    }

    pub fn value_string(&self) -> String {
        format_significant(i64::from(self.current.value()), 3)
    }

    pub fn trend_string(&self) -> &'static str {
        self.current.trend().symbol()
    }

    pub fn delta_string(&self) -> String {
        format_delta(self.delta)
    }

    pub fn age_string(&self) -> String {
        if self.is_stale {
            STALE_AGE_TEXT.to_string()
        } else {
            format_age(self.age)
        }
    }
}

/// First element of a newest-first collection, or [`Reading::placeholder`].
pub fn current_reading(readings: &[Reading]) -> Reading {
    readings.first().copied().unwrap_or_else(Reading::placeholder)
}

/// Change between the two newest readings.
///
/// `None` with fewer than two readings, or when they are more than `max_gap`
/// apart (a missed sample would make the delta misleading).
pub fn delta(readings: &[Reading], max_gap: Duration) -> Option<i32> {
    let [latest, previous, ..] = readings else {
        return None;
    };
    let gap = latest.timestamp() - previous.timestamp();
    if gap.is_negative() || gap > max_gap {
        return None;
    }
    Some(latest.value() - previous.value())
}

/// Whether `reading` is older than `threshold` at `now`.
pub fn is_stale(reading: &Reading, now: OffsetDateTime, threshold: Duration) -> bool {
    age_of(reading, now) > threshold
}

fn age_of(reading: &Reading, now: OffsetDateTime) -> Duration {
    Duration::try_from(reading.age_at(now)).unwrap_or(Duration::ZERO)
}

fn staleness_fraction(age: Duration, threshold: Duration) -> f64 {
    if threshold.is_zero() {
        return 1.0;
    }
    (age.as_secs_f64() / threshold.as_secs_f64()).clamp(0.0, 1.0)
}

/// Round an integer to `digits` significant digits.
///
/// ```
/// use glance_core::metrics::format_significant;
///
/// assert_eq!(format_significant(112, 3), "112");
/// assert_eq!(format_significant(-12, 3), "-12");
/// assert_eq!(format_significant(1234, 3), "1230");
/// ```
pub fn format_significant(value: i64, digits: u32) -> String {
    let magnitude = value.unsigned_abs();
    let len = magnitude.checked_ilog10().map_or(1, |l| l + 1);
    if digits == 0 || len <= digits {
        return value.to_string();
    }

    let scale = 10u64.pow(len - digits);
    let rounded = (magnitude + scale / 2) / scale * scale;
    if value < 0 {
        format!("-{rounded}")
    } else {
        rounded.to_string()
    }
}

/// Delta with an explicit sign, or empty when undefined.
pub fn format_delta(delta: Option<i32>) -> String {
    match delta {
        Some(d) if d >= 0 => format!("+{}", format_significant(i64::from(d), 3)),
        Some(d) => format_significant(i64::from(d), 3),
        None => String::new(),
    }
}

/// Short relative age such as `"2 min, 5 sec"` or `"1 hr, 3 min"`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs >= 3600 {
        format!("{} hr, {} min", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{} min, {} sec", secs / 60, secs % 60)
    }
}
