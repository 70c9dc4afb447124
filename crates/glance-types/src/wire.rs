//! Share service record format.
//!
//! The share service sends readings as JSON objects:
//!
//! ```json
//! { "Value": 112, "Trend": 4, "WT": "/Date(1462404576000)/" }
//! ```
//!
//! `WT` embeds the sample time in milliseconds since the Unix epoch. With the
//! `serde` feature enabled, [`Reading`] serializes to and from exactly this
//! shape, so a batch decodes with `serde_json::from_slice::<Vec<Reading>>`.
//! A bad timestamp or trend code in any record fails the whole batch.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ParseError, ParseResult};
#[cfg(feature = "serde")]
use crate::types::Trend;
use crate::types::Reading;

/// Extract the timestamp from a share date string such as `/Date(1462404576000)/`.
///
/// The first run of ASCII digits is taken as milliseconds since the epoch;
/// anything around it (prefix, timezone suffix) is ignored.
///
/// ```
/// use glance_types::wire::parse_share_date;
///
/// let ts = parse_share_date("/Date(1462404576000)/").unwrap();
/// assert_eq!(ts.unix_timestamp(), 1462404576);
/// assert!(parse_share_date("yesterday").is_err());
/// ```
pub fn parse_share_date(raw: &str) -> ParseResult<OffsetDateTime> {
    let start = raw
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| ParseError::InvalidTimestamp(format!("no digits in '{raw}'")))?;
    let digits: &str = {
        let rest = &raw[start..];
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        &rest[..end]
    };

    let millis: i64 = digits
        .parse()
        .map_err(|e| ParseError::InvalidTimestamp(format!("'{raw}': {e}")))?;

    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| ParseError::InvalidTimestamp(format!("'{raw}': {e}")))
}

/// Format a reading's timestamp the way the share service does.
#[must_use]
pub fn format_share_date(reading: &Reading) -> String {
    format!("/Date({})/", reading.unix_millis())
}

/// A reading as it appears on the wire.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ShareRecord {
    #[serde(rename = "Value")]
    value: i32,
    #[serde(rename = "Trend")]
    trend: Trend,
    #[serde(rename = "WT")]
    wt: String,
}

#[cfg(feature = "serde")]
impl TryFrom<ShareRecord> for Reading {
    type Error = ParseError;

    fn try_from(record: ShareRecord) -> Result<Self, Self::Error> {
        let timestamp = parse_share_date(&record.wt)?;
        Ok(Reading::new(record.value, record.trend, timestamp))
    }
}

#[cfg(feature = "serde")]
impl From<Reading> for ShareRecord {
    fn from(reading: Reading) -> Self {
        Self {
            value: reading.value(),
            trend: reading.trend(),
            wt: format_share_date(&reading),
        }
    }
}
