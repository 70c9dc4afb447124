//! A fixed data source for previews and demos.

use async_trait::async_trait;
use time::OffsetDateTime;

use glance_types::{PLACEHOLDER_VALUE, Reading, Trend};

use crate::error::Result;
use crate::provider::GlucoseProvider;

/// Always answers with one steady reading taken two minutes ago.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleProvider;

impl ExampleProvider {
    pub fn new() -> Self {
        Self
    }

    /// The reading this provider reports at `now`.
    pub fn reading_at(now: OffsetDateTime) -> Reading {
        Reading::new(PLACEHOLDER_VALUE, Trend::Flat, now - time::Duration::minutes(2))
    }
}

#[async_trait]
impl GlucoseProvider for ExampleProvider {
    async fn authenticate(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_latest_readings(&self, count: usize) -> Result<Vec<Reading>> {
        let mut readings = vec![Self::reading_at(OffsetDateTime::now_utc())];
        readings.truncate(count);
        Ok(readings)
    }

    async fn invalidate_session(&self) {}
}
