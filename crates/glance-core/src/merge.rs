//! Merging fetched readings into the known collection.
//!
//! A collection is always sorted newest first and holds at most one reading
//! per timestamp. [`merge`] keeps that shape and behaves like a set union:
//! it is idempotent, commutative and associative, so overlapping or
//! out-of-order fetches cannot corrupt the collection.

use std::collections::BTreeMap;
use std::time::Duration;

use time::OffsetDateTime;

use glance_types::Reading;

/// How far back readings are kept when loading from disk.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Union of `current` and `fetched`, newest first, one reading per timestamp.
///
/// Identical readings collapse. When two different readings share a
/// timestamp the greater one (by value, then trend) wins, which keeps the
/// result independent of argument order.
///
/// ```
/// use glance_core::merge;
/// use glance_types::{Reading, Trend};
/// use time::macros::datetime;
///
/// let a = Reading::new(100, Trend::Flat, datetime!(2024-05-01 12:05 UTC));
/// let b = Reading::new(112, Trend::Flat, datetime!(2024-05-01 12:00 UTC));
///
/// assert_eq!(merge(&[b], &[a, b]), vec![a, b]);
/// ```
#[must_use]
pub fn merge(current: &[Reading], fetched: &[Reading]) -> Vec<Reading> {
    let mut by_time: BTreeMap<OffsetDateTime, Reading> = BTreeMap::new();
    for reading in current.iter().chain(fetched) {
        by_time
            .entry(reading.timestamp())
            .and_modify(|existing| {
                if reading > existing {
                    *existing = *reading;
                }
            })
            .or_insert(*reading);
    }
    by_time.into_values().rev().collect()
}

/// Drop readings older than `window` or dated after `now`, and normalize
/// what is left.
#[must_use]
pub fn retain_window(readings: &[Reading], now: OffsetDateTime, window: Duration) -> Vec<Reading> {
    let kept: Vec<Reading> = readings
        .iter()
        .filter(|r| {
            let age = r.age_at(now);
            !age.is_negative() && age <= window
        })
        .copied()
        .collect();
    merge(&[], &kept)
}
