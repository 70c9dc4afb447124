//! Core types for glucose reading data.

use core::cmp::Ordering;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{ParseError, ParseResult};

/// Value shown when no reading has ever been received.
pub const PLACEHOLDER_VALUE: i32 = 100;

/// Direction and rate of change reported alongside a glucose value.
///
/// The discriminants match the integer codes used by the share service.
///
/// ```
/// use glance_types::Trend;
///
/// assert_eq!(Trend::try_from(4), Ok(Trend::Flat));
/// assert_eq!(Trend::Flat.symbol(), "→");
/// assert!(Trend::try_from(8).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "i64", into = "u8")
)]
#[repr(u8)]
pub enum Trend {
    /// No trend available.
    #[default]
    Unknown = 0,
    /// Rising very fast.
    UpUpUp = 1,
    /// Rising fast.
    UpUp = 2,
    /// Rising.
    Up = 3,
    /// Steady.
    Flat = 4,
    /// Falling.
    Down = 5,
    /// Falling fast.
    DownDown = 6,
    /// Falling very fast.
    DownDownDown = 7,
}

impl Trend {
    /// All trends in code order.
    pub const ALL: [Trend; 8] = [
        Trend::Unknown,
        Trend::UpUpUp,
        Trend::UpUp,
        Trend::Up,
        Trend::Flat,
        Trend::Down,
        Trend::DownDown,
        Trend::DownDownDown,
    ];

    /// The integer code used on the wire and in storage.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Directional glyph for compact display. Empty for [`Trend::Unknown`].
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Unknown => "",
            Trend::UpUpUp => "⇈",
            Trend::UpUp => "↑",
            Trend::Up => "↗︎",
            Trend::Flat => "→",
            Trend::Down => "↘︎",
            Trend::DownDown => "↓",
            Trend::DownDownDown => "⇊",
        }
    }

    /// Human-readable description, suitable for accessibility labels.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Trend::Unknown => "Unknown",
            Trend::UpUpUp => "Rising very fast",
            Trend::UpUp => "Rising fast",
            Trend::Up => "Rising",
            Trend::Flat => "Flat",
            Trend::Down => "Falling",
            Trend::DownDown => "Falling fast",
            Trend::DownDownDown => "Falling very fast",
        }
    }
}

impl TryFrom<i64> for Trend {
    type Error = ParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Trend::Unknown),
            1 => Ok(Trend::UpUpUp),
            2 => Ok(Trend::UpUp),
            3 => Ok(Trend::Up),
            4 => Ok(Trend::Flat),
            5 => Ok(Trend::Down),
            6 => Ok(Trend::DownDown),
            7 => Ok(Trend::DownDownDown),
            other => Err(ParseError::UnknownTrend(other)),
        }
    }
}

impl From<Trend> for u8 {
    fn from(trend: Trend) -> Self {
        trend.code()
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single glucose sample.
///
/// Readings are immutable once constructed. Timestamps are kept at
/// millisecond precision, which is what the share service and the store
/// carry, so a reading compares equal to itself after a round trip.
///
/// Equality and hashing are structural. Ordering is chronological, with
/// value and trend as tie-breakers so that `Ord` agrees with `Eq`.
///
/// ```
/// use glance_types::{Reading, Trend};
/// use time::macros::datetime;
///
/// let older = Reading::new(112, Trend::Flat, datetime!(2024-05-01 12:00 UTC));
/// let newer = Reading::new(100, Trend::Flat, datetime!(2024-05-01 12:05 UTC));
/// assert!(newer > older);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "crate::wire::ShareRecord", into = "crate::wire::ShareRecord")
)]
pub struct Reading {
    value: i32,
    trend: Trend,
    timestamp: OffsetDateTime,
}

impl Reading {
    /// Create a reading. Sub-millisecond precision is discarded.
    #[must_use]
    pub fn new(value: i32, trend: Trend, timestamp: OffsetDateTime) -> Self {
        Self {
            value,
            trend,
            timestamp: truncate_to_millis(timestamp),
        }
    }

    /// Create a reading from a timestamp in milliseconds since the Unix epoch.
    pub fn from_unix_millis(value: i32, trend: Trend, millis: i64) -> ParseResult<Self> {
        let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map_err(|e| ParseError::InvalidTimestamp(format!("{millis} ms: {e}")))?;
        Ok(Self {
            value,
            trend,
            timestamp,
        })
    }

    /// The sentinel shown before any reading is known: value
    /// [`PLACEHOLDER_VALUE`], unknown trend, dated at the Unix epoch so it is
    /// always stale.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            value: PLACEHOLDER_VALUE,
            trend: Trend::Unknown,
            timestamp: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Glucose value in mg/dL.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Trend reported with the value.
    #[must_use]
    pub fn trend(&self) -> Trend {
        self.trend
    }

    /// When the sample was taken.
    #[must_use]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Timestamp in milliseconds since the Unix epoch.
    #[must_use]
    pub fn unix_millis(&self) -> i64 {
        // Range of OffsetDateTime keeps this well inside i64.
        (self.timestamp.unix_timestamp_nanos() / 1_000_000) as i64
    }

    /// Time elapsed between the sample and `now`. Negative if the reading is
    /// dated in the future.
    #[must_use]
    pub fn age_at(&self, now: OffsetDateTime) -> Duration {
        now - self.timestamp
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl PartialOrd for Reading {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reading {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.value.cmp(&other.value))
            .then_with(|| self.trend.cmp(&other.trend))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {} {}", self.timestamp, self.value, self.trend.symbol())
    }
}

fn truncate_to_millis(timestamp: OffsetDateTime) -> OffsetDateTime {
    let sub_millis = timestamp.nanosecond() % 1_000_000;
    timestamp - Duration::nanoseconds(i64::from(sub_millis))
}
