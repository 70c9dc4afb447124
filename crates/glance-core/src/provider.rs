//! The data-source abstraction.
//!
//! [`GlucoseProvider`] is implemented by the live [`ShareClient`](crate::ShareClient),
//! the fixed [`ExampleProvider`](crate::ExampleProvider) and the scripted
//! [`MockProvider`](crate::MockProvider), so the monitor can be driven by any
//! of them.

use async_trait::async_trait;

use glance_types::Reading;

use crate::error::Result;

/// A source of glucose readings behind some kind of session.
///
/// # Example
///
/// ```no_run
/// use glance_core::{GlucoseProvider, Result};
///
/// async fn latest<P: GlucoseProvider + ?Sized>(provider: &P) -> Result<Option<i32>> {
///     let readings = provider.fetch_latest_readings(1).await?;
///     Ok(readings.first().map(|r| r.value()))
/// }
/// ```
#[async_trait]
pub trait GlucoseProvider: Send + Sync {
    /// Establish a session. Fetching authenticates on its own when needed,
    /// so calling this up front is only useful to surface credential
    /// problems early.
    async fn authenticate(&self) -> Result<()>;

    /// Fetch up to `count` of the most recent readings, newest first.
    async fn fetch_latest_readings(&self, count: usize) -> Result<Vec<Reading>>;

    /// Drop the session and any cached state. The next fetch starts fresh.
    async fn invalidate_session(&self);
}
