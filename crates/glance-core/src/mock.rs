//! Scripted provider for testing.
//!
//! [`MockProvider`] implements [`GlucoseProvider`] without any network. It
//! replays a list of reading batches: each fetch returns the next batch
//! (truncated to the requested count), and once the script runs out every
//! fetch returns an empty batch.
//!
//! # Features
//!
//! - **Authentication control**: refuse logins to exercise credential errors
//! - **Failure injection**: fail every fetch, or only the next `n`
//! - **Latency simulation**: delay fetches to exercise overlapping checks
//! - **Call counters**: observe how often the monitor hit the provider

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use glance_types::Reading;

use crate::error::{Error, Result};
use crate::provider::GlucoseProvider;

/// Login error code reported when authentication is switched off.
pub const MOCK_LOGIN_ERROR: &str = "SSO_AuthenticatePasswordInvalid";

#[derive(Debug, Default)]
struct Script {
    batches: Vec<Vec<Reading>>,
    cursor: usize,
    authenticated: bool,
}

/// A provider that replays scripted batches.
///
/// Invalidating the session logs out and rewinds the script, so the next
/// fetch starts again from the first batch.
///
/// # Example
///
/// ```
/// use glance_core::{GlucoseProvider, MockProvider};
/// use glance_types::{Reading, Trend};
///
/// #[tokio::main]
/// async fn main() {
///     let reading = Reading::new(112, Trend::Flat, time::OffsetDateTime::now_utc());
///     let provider = MockProvider::builder().batch(vec![reading]).build();
///
///     assert_eq!(provider.fetch_latest_readings(2).await.unwrap(), vec![reading]);
///     assert!(provider.fetch_latest_readings(2).await.unwrap().is_empty());
/// }
/// ```
pub struct MockProvider {
    script: Mutex<Script>,
    should_authenticate: AtomicBool,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
    remaining_failures: AtomicU32,
    /// Simulated fetch latency in milliseconds (0 = no delay).
    fetch_latency_ms: AtomicU64,
    fetch_count: AtomicU32,
    auth_count: AtomicU32,
    invalidate_count: AtomicU32,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("should_authenticate", &self.should_authenticate.load(Ordering::Relaxed))
            .field("fetch_count", &self.fetch_count.load(Ordering::Relaxed))
            .field("auth_count", &self.auth_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Vec::new(), true)
    }
}

impl MockProvider {
    /// Create a provider that replays `batches`.
    pub fn new(batches: Vec<Vec<Reading>>, should_authenticate: bool) -> Self {
        Self {
            script: Mutex::new(Script {
                batches,
                ..Script::default()
            }),
            should_authenticate: AtomicBool::new(should_authenticate),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("Mock failure".to_string()),
            remaining_failures: AtomicU32::new(0),
            fetch_latency_ms: AtomicU64::new(0),
            fetch_count: AtomicU32::new(0),
            auth_count: AtomicU32::new(0),
            invalidate_count: AtomicU32::new(0),
        }
    }

    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder::new()
    }

    async fn check_should_fail(&self) -> Result<()> {
        let latency = self.fetch_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::fetch(self.fail_message.read().await.clone()));
        }

        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::fetch(self.fail_message.read().await.clone()))
        } else {
            Ok(())
        }
    }

    fn login(&self, script: &mut Script) -> Result<()> {
        self.auth_count.fetch_add(1, Ordering::Relaxed);
        if !self.should_authenticate.load(Ordering::Relaxed) {
            debug!("Mock login refused");
            return Err(Error::login(MOCK_LOGIN_ERROR));
        }
        script.authenticated = true;
        Ok(())
    }

    // --- Test control methods ---

    /// Append a batch to the end of the script.
    pub async fn push_batch(&self, batch: Vec<Reading>) {
        self.script.lock().await.batches.push(batch);
    }

    /// Allow or refuse future logins.
    pub fn set_should_authenticate(&self, allow: bool) {
        self.should_authenticate.store(allow, Ordering::Relaxed);
    }

    /// Make every fetch fail until switched off.
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.fail_message.write().await = msg.to_string();
        }
    }

    /// Fail the next `count` fetches, then behave normally.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    pub fn remaining_failures(&self) -> u32 {
        self.remaining_failures.load(Ordering::Relaxed)
    }

    /// Set simulated fetch latency. `Duration::ZERO` disables it.
    pub fn set_fetch_latency(&self, latency: Duration) {
        self.fetch_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of fetch calls, including failed ones.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Number of login attempts, explicit or implicit.
    pub fn auth_count(&self) -> u32 {
        self.auth_count.load(Ordering::Relaxed)
    }

    pub fn invalidate_count(&self) -> u32 {
        self.invalidate_count.load(Ordering::Relaxed)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.script.lock().await.authenticated
    }
}

#[async_trait]
impl GlucoseProvider for MockProvider {
    async fn authenticate(&self) -> Result<()> {
        let mut script = self.script.lock().await;
        self.login(&mut script)
    }

    async fn fetch_latest_readings(&self, count: usize) -> Result<Vec<Reading>> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail().await?;

        let mut script = self.script.lock().await;
        if !script.authenticated {
            self.login(&mut script)?;
        }

        let Some(batch) = script.batches.get(script.cursor) else {
            debug!("Mock script exhausted");
            return Ok(Vec::new());
        };
        let mut batch = batch.clone();
        script.cursor += 1;
        batch.truncate(count);
        Ok(batch)
    }

    async fn invalidate_session(&self) {
        self.invalidate_count.fetch_add(1, Ordering::Relaxed);
        let mut script = self.script.lock().await;
        script.authenticated = false;
        script.cursor = 0;
    }
}

/// Builder for [`MockProvider`].
#[derive(Debug, Clone)]
pub struct MockProviderBuilder {
    batches: Vec<Vec<Reading>>,
    should_authenticate: bool,
    fail_message: String,
    transient_failures: u32,
    fetch_latency: Duration,
}

impl Default for MockProviderBuilder {
    fn default() -> Self {
        Self {
            batches: Vec::new(),
            should_authenticate: true,
            fail_message: "Mock failure".to_string(),
            transient_failures: 0,
            fetch_latency: Duration::ZERO,
        }
    }
}

impl MockProviderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one batch to the script.
    #[must_use]
    pub fn batch(mut self, batch: Vec<Reading>) -> Self {
        self.batches.push(batch);
        self
    }

    /// Append several batches to the script.
    #[must_use]
    pub fn batches(mut self, batches: impl IntoIterator<Item = Vec<Reading>>) -> Self {
        self.batches.extend(batches);
        self
    }

    #[must_use]
    pub fn should_authenticate(mut self, allow: bool) -> Self {
        self.should_authenticate = allow;
        self
    }

    /// Fail the first `count` fetches.
    #[must_use]
    pub fn transient_failures(mut self, count: u32) -> Self {
        self.transient_failures = count;
        self
    }

    #[must_use]
    pub fn fail_message(mut self, message: &str) -> Self {
        self.fail_message = message.to_string();
        self
    }

    #[must_use]
    pub fn fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    #[must_use]
    pub fn build(self) -> MockProvider {
        let provider = MockProvider::new(self.batches, self.should_authenticate);
        provider.set_transient_failures(self.transient_failures);
        provider.set_fetch_latency(self.fetch_latency);
        MockProvider {
            fail_message: RwLock::new(self.fail_message),
            ..provider
        }
    }
}
