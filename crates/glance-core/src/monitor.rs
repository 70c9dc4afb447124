//! The glucose data model shared by every presentation surface.
//!
//! [`GlucoseMonitor`] owns the published reading collection. It pulls new
//! readings from a [`GlucoseProvider`], merges them in, persists the result
//! and schedules the next poll. Observers subscribe to a watch channel and
//! redraw whenever the collection changes.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use glance_store::ReadingStore;
use glance_types::Reading;

use crate::error::{Error, Result};
use crate::merge::{RETENTION_WINDOW, merge, retain_window};
use crate::metrics::GlanceMetrics;
use crate::options::GlanceOptions;
use crate::persist::{StoreWriter, await_save};
use crate::provider::GlucoseProvider;
use crate::range::RangeBand;
use crate::scheduler::{PollPlan, PollScheduler, plan};

/// Future returned by [`GlucoseMonitor::poll`].
pub type PollFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Reading collection, fetch loop and derived display values.
///
/// Build one per process in the composition root and share it behind an
/// [`Arc`]; user-triggered checks and the poll timer may call into it
/// concurrently.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use glance_core::{ExampleProvider, GlanceOptions, GlucoseMonitor};
///
/// #[tokio::main]
/// async fn main() {
///     let monitor = GlucoseMonitor::new(Arc::new(ExampleProvider::new()), GlanceOptions::default());
///     assert!(monitor.check_for_new_readings().await);
///     assert_eq!(monitor.value_string(), "100");
///     assert!(!monitor.is_stale());
/// }
/// ```
pub struct GlucoseMonitor {
    provider: Arc<dyn GlucoseProvider>,
    options: GlanceOptions,
    readings: watch::Sender<Vec<Reading>>,
    last_error: watch::Sender<Option<String>>,
    /// Store waiting to be loaded by [`start`](Self::start).
    store: Mutex<Option<ReadingStore>>,
    writer: OnceLock<StoreWriter>,
    scheduler: PollScheduler,
    suspending: AtomicBool,
}

impl std::fmt::Debug for GlucoseMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlucoseMonitor")
            .field("readings", &self.readings.borrow().len())
            .field("last_error", &*self.last_error.borrow())
            .field("persistent", &self.writer.get().is_some())
            .field("scheduled", &self.scheduler.is_scheduled())
            .finish()
    }
}

impl GlucoseMonitor {
    /// Create a monitor that keeps readings in memory only.
    pub fn new(provider: Arc<dyn GlucoseProvider>, options: GlanceOptions) -> Self {
        Self {
            provider,
            options,
            readings: watch::Sender::new(Vec::new()),
            last_error: watch::Sender::new(None),
            store: Mutex::new(None),
            writer: OnceLock::new(),
            scheduler: PollScheduler::new(),
            suspending: AtomicBool::new(false),
        }
    }

    /// Create a monitor backed by `store`. Nothing is read until [`start`](Self::start).
    pub fn with_store(
        provider: Arc<dyn GlucoseProvider>,
        options: GlanceOptions,
        store: ReadingStore,
    ) -> Self {
        let monitor = Self::new(provider, options);
        *monitor.store.lock().unwrap_or_else(PoisonError::into_inner) = Some(store);
        monitor
    }

    pub fn options(&self) -> &GlanceOptions {
        &self.options
    }

    /// Load stored readings, fetch, then arm the next poll.
    ///
    /// A store that exists but cannot be read is fatal. The fetch always
    /// happens, however fresh the stored readings are, and completes before
    /// this returns; later polls run on timers.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.load_stored().await?;
        self.check_for_new_readings().await;
        self.schedule_next_poll();
        Ok(())
    }

    /// Load the store handed to [`with_store`](Self::with_store), keep the
    /// last 24 hours, and start the store writer. Returns how many readings
    /// were kept.
    pub async fn load_stored(&self) -> Result<usize> {
        let store = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut store) = store else {
            return Ok(0);
        };

        let (store, loaded) = tokio::task::spawn_blocking(move || {
            let loaded = store.load();
            (store, loaded)
        })
        .await
        .map_err(|e| Error::Task(format!("store load panicked: {e}")))?;
        let loaded = loaded?;

        let kept = retain_window(&loaded, OffsetDateTime::now_utc(), RETENTION_WINDOW);
        if kept.len() != loaded.len() {
            debug!("Dropped {} readings outside the retention window", loaded.len() - kept.len());
        }
        info!("Restored {} readings from the store", kept.len());

        let count = kept.len();
        self.readings.send_if_modified(|current| {
            let merged = merge(current, &kept);
            if merged == *current {
                return false;
            }
            *current = merged;
            true
        });

        let _ = self.writer.set(StoreWriter::spawn(store));
        Ok(count)
    }

    /// Fetch from the provider and merge whatever came back.
    ///
    /// Returns `true` if the fetch succeeded, whether or not it brought
    /// anything new. On failure the session is invalidated, the error is
    /// published through [`last_error`](Self::last_error) and the known
    /// readings stay as they were.
    pub async fn check_for_new_readings(&self) -> bool {
        debug!("Checking for new readings");
        let count = self.options.polling.fetch_count;

        match self.provider.fetch_latest_readings(count).await {
            Ok(fetched) => {
                let pending = self.apply(&fetched);
                self.last_error.send_if_modified(|e| e.take().is_some());
                if let Some(rx) = pending {
                    match await_save(rx).await {
                        Ok(_) => debug!("Readings persisted before returning"),
                        Err(e) => error!("Failed to persist readings: {}", e),
                    }
                }
                true
            }
            Err(err) => {
                warn!("Fetch failed: {}", err);
                let message = err.to_string();
                self.last_error.send_if_modified(|e| {
                    if e.as_deref() == Some(message.as_str()) {
                        return false;
                    }
                    *e = Some(message.clone());
                    true
                });
                self.provider.invalidate_session().await;
                false
            }
        }
    }

    /// Merge `fetched` into the published collection, queueing a save if it
    /// changed. Returns a receiver to wait on when the save must complete
    /// before returning.
    fn apply(
        &self,
        fetched: &[Reading],
    ) -> Option<tokio::sync::oneshot::Receiver<Result<bool>>> {
        let wait = self.suspending.load(Ordering::SeqCst);
        let mut pending = None;
        let changed = self.readings.send_if_modified(|current| {
            let merged = merge(current, fetched);
            if merged == *current {
                return false;
            }
            // Queued under the channel lock so saves follow merge order.
            if let Some(writer) = self.writer.get() {
                pending = writer.enqueue(merged.clone(), wait);
            }
            *current = merged;
            true
        });

        if changed {
            debug!("Reading collection changed");
        } else {
            debug!("No new readings");
        }
        pending
    }

    /// Fetch now if the newest reading is overdue, otherwise arm a timer for
    /// when it will be. After a fetch the next poll is always armed: at the
    /// next expected reading, or after the stale retry interval when the
    /// service had nothing newer.
    pub fn poll(self: &Arc<Self>) -> PollFuture {
        let monitor = Arc::clone(self);
        Box::pin(async move {
            if monitor.scheduler.is_cancelled() {
                return;
            }
            let interval = monitor.options.polling.automatic_fetch_interval;
            let latest = monitor.latest();

            match plan(latest.as_ref(), OffsetDateTime::now_utc(), interval) {
                PollPlan::WaitFor(delay) => {
                    monitor.scheduler.schedule(delay, monitor.poll());
                }
                PollPlan::FetchNow => {
                    monitor.check_for_new_readings().await;
                    monitor.schedule_next_poll();
                }
            }
        })
    }

    /// Arm the poll after a fetch: at the next expected reading, or after
    /// the stale retry interval when the newest reading is already overdue.
    fn schedule_next_poll(self: &Arc<Self>) {
        let polling = &self.options.polling;
        let delay = match plan(
            self.latest().as_ref(),
            OffsetDateTime::now_utc(),
            polling.automatic_fetch_interval,
        ) {
            PollPlan::WaitFor(delay) => delay,
            PollPlan::FetchNow => polling.stale_retry_interval,
        };
        self.scheduler.schedule(delay, self.poll());
    }

    fn latest(&self) -> Option<Reading> {
        self.readings.borrow().first().copied()
    }

    // --- Observation ---

    /// Watch the reading collection. The receiver is notified only when the
    /// collection actually changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Reading>> {
        self.readings.subscribe()
    }

    /// Watch the most recent fetch error (cleared by the next success).
    pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    /// Current collection, newest first.
    pub fn readings(&self) -> Vec<Reading> {
        self.readings.borrow().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Whether a deferred poll is pending.
    pub fn is_poll_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    // --- Derived values ---

    pub fn metrics_at(&self, now: OffsetDateTime) -> GlanceMetrics {
        GlanceMetrics::compute(&self.readings.borrow(), now, &self.options.display)
    }

    pub fn metrics(&self) -> GlanceMetrics {
        self.metrics_at(OffsetDateTime::now_utc())
    }

    /// Newest reading, or the placeholder when none is known.
    pub fn current_reading(&self) -> Reading {
        self.latest().unwrap_or_else(Reading::placeholder)
    }

    pub fn is_stale(&self) -> bool {
        self.metrics().is_stale()
    }

    pub fn delta(&self) -> Option<i32> {
        self.metrics().delta()
    }

    pub fn value_string(&self) -> String {
        self.metrics().value_string()
    }

    pub fn trend_string(&self) -> &'static str {
        self.current_reading().trend().symbol()
    }

    pub fn delta_string(&self) -> String {
        self.metrics().delta_string()
    }

    pub fn age_string(&self) -> String {
        self.metrics().age_string()
    }

    /// Display band for an arbitrary value under the configured thresholds.
    pub fn color(&self, value: i32) -> RangeBand {
        RangeBand::for_value(value, &self.options.display)
    }

    // --- Lifecycle ---

    /// While suspending, saves complete before
    /// [`check_for_new_readings`](Self::check_for_new_readings) returns.
    pub fn set_suspending(&self, suspending: bool) {
        self.suspending.store(suspending, Ordering::SeqCst);
    }

    /// Wait for all queued saves to reach the store.
    pub async fn flush(&self) -> Result<()> {
        match self.writer.get() {
            Some(writer) => writer.flush().await,
            None => Ok(()),
        }
    }

    /// Number of saves that changed the store since start.
    pub fn persisted_writes(&self) -> u64 {
        self.writer.get().map_or(0, StoreWriter::writes)
    }

    /// Stop scheduling polls and flush pending saves.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down glucose monitor");
        self.scheduler.cancel();
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use glance_types::Trend;

    use crate::mock::MockProvider;

    fn whole_seconds(now: OffsetDateTime) -> OffsetDateTime {
        now.replace_nanosecond(0).unwrap()
    }

    fn monitor_with(provider: MockProvider) -> (Arc<MockProvider>, GlucoseMonitor) {
        let provider = Arc::new(provider);
        let monitor = GlucoseMonitor::new(provider.clone(), GlanceOptions::default());
        (provider, monitor)
    }

    #[tokio::test]
    async fn test_empty_fetch_shows_placeholder() {
        let (_, monitor) = monitor_with(MockProvider::default());
        assert!(monitor.check_for_new_readings().await);

        assert!(monitor.readings().is_empty());
        assert_eq!(monitor.current_reading(), Reading::placeholder());
        assert!(monitor.is_stale());
        assert_eq!(monitor.delta(), None);
        assert_eq!(monitor.delta_string(), "");
        assert_eq!(monitor.value_string(), "100");
        assert_eq!(monitor.trend_string(), "");
    }

    #[tokio::test]
    async fn test_up_to_date_readings() {
        let base = whole_seconds(OffsetDateTime::now_utc());
        let readings = vec![
            Reading::new(100, Trend::Flat, base),
            Reading::new(112, Trend::Flat, base - time::Duration::minutes(5)),
        ];
        let (_, monitor) = monitor_with(MockProvider::builder().batch(readings.clone()).build());
        assert!(monitor.check_for_new_readings().await);

        assert_eq!(monitor.readings(), readings);
        assert!(!monitor.is_stale());
        assert_eq!(monitor.delta(), Some(-12));
        assert_eq!(monitor.delta_string(), "-12");
        assert_eq!(monitor.value_string(), "100");
        assert_eq!(monitor.trend_string(), "→");
    }

    #[tokio::test]
    async fn test_far_apart_readings() {
        let base = whole_seconds(OffsetDateTime::now_utc());
        let readings = vec![
            Reading::new(100, Trend::Flat, base),
            Reading::new(112, Trend::Flat, base - time::Duration::minutes(11)),
        ];
        let (_, monitor) = monitor_with(MockProvider::builder().batch(readings.clone()).build());
        monitor.check_for_new_readings().await;

        assert_eq!(monitor.readings(), readings);
        assert!(!monitor.is_stale());
        assert_eq!(monitor.delta(), None);
        assert_eq!(monitor.delta_string(), "");
    }

    #[tokio::test]
    async fn test_long_ago_readings() {
        let base = OffsetDateTime::UNIX_EPOCH + time::Duration::weeks(520);
        let readings = vec![
            Reading::new(100, Trend::Flat, base),
            Reading::new(112, Trend::Flat, base - time::Duration::minutes(5)),
        ];
        let (_, monitor) = monitor_with(MockProvider::builder().batch(readings.clone()).build());
        monitor.check_for_new_readings().await;

        assert_eq!(monitor.readings(), readings);
        assert!(monitor.is_stale());
        assert_eq!(monitor.delta(), Some(-12));
        assert_eq!(monitor.age_string(), "OLD");
    }

    #[tokio::test]
    async fn test_superset_fetch_replaces_head_and_notifies() {
        let base = whole_seconds(OffsetDateTime::now_utc());
        let r0 = Reading::new(100, Trend::Flat, base - time::Duration::minutes(5));
        let r1 = Reading::new(112, Trend::Up, base);
        let (_, monitor) = monitor_with(
            MockProvider::builder()
                .batch(vec![r0])
                .batch(vec![r1, r0])
                .build(),
        );
        let mut rx = monitor.subscribe();

        monitor.check_for_new_readings().await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        monitor.check_for_new_readings().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![r1, r0]);
        assert_eq!(monitor.current_reading(), r1);
    }

    #[tokio::test]
    async fn test_known_only_fetch_does_not_notify() {
        let base = whole_seconds(OffsetDateTime::now_utc());
        let r0 = Reading::new(100, Trend::Flat, base);
        let (_, monitor) = monitor_with(
            MockProvider::builder()
                .batch(vec![r0])
                .batch(vec![r0])
                .batch(vec![])
                .build(),
        );
        let mut rx = monitor.subscribe();

        monitor.check_for_new_readings().await;
        rx.borrow_and_update();

        assert!(monitor.check_for_new_readings().await);
        assert!(!rx.has_changed().unwrap());
        assert!(monitor.check_for_new_readings().await);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(monitor.readings(), vec![r0]);
    }

    #[tokio::test]
    async fn test_failure_keeps_readings_and_invalidates() {
        let base = whole_seconds(OffsetDateTime::now_utc());
        let r0 = Reading::new(100, Trend::Flat, base);
        let (provider, monitor) = monitor_with(MockProvider::builder().batch(vec![r0]).build());
        monitor.check_for_new_readings().await;

        provider.set_should_fail(true, Some("offline")).await;
        assert!(!monitor.check_for_new_readings().await);
        assert_eq!(monitor.readings(), vec![r0]);
        assert_eq!(monitor.last_error().as_deref(), Some("Fetch Error: offline"));
        assert_eq!(provider.invalidate_count(), 1);

        provider.set_should_fail(false, None).await;
        assert!(monitor.check_for_new_readings().await);
        assert_eq!(monitor.last_error(), None);
    }

    #[tokio::test]
    async fn test_login_refusal_is_reported() {
        let (_, monitor) = monitor_with(MockProvider::builder().should_authenticate(false).build());
        assert!(!monitor.check_for_new_readings().await);
        let error = monitor.last_error().unwrap();
        assert!(error.starts_with("Login Error"));
        assert!(monitor.readings().is_empty());
    }

    #[tokio::test]
    async fn test_color_uses_thresholds() {
        let (_, monitor) = monitor_with(MockProvider::default());
        assert_eq!(monitor.color(60), RangeBand::BelowRange);
        assert_eq!(monitor.color(120), RangeBand::InRange);
        assert_eq!(monitor.color(300), RangeBand::AboveRange);
    }

    #[tokio::test]
    async fn test_concurrent_checks_converge() {
        let base = whole_seconds(OffsetDateTime::now_utc());
        let older = Reading::new(100, Trend::Flat, base - time::Duration::minutes(5));
        let newer = Reading::new(104, Trend::Flat, base);
        let provider = Arc::new(
            MockProvider::builder()
                .batch(vec![newer, older])
                .batch(vec![older])
                .build(),
        );
        let monitor = Arc::new(GlucoseMonitor::new(provider, GlanceOptions::default()));

        let a = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.check_for_new_readings().await }
        });
        let b = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.check_for_new_readings().await }
        });
        assert!(a.await.unwrap());
        assert!(b.await.unwrap());
        assert_eq!(monitor.readings(), vec![newer, older]);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.db");
        let now = whole_seconds(OffsetDateTime::now_utc());
        let fresh = Reading::new(120, Trend::Flat, now - time::Duration::minutes(3));
        let ancient = Reading::new(90, Trend::Flat, now - time::Duration::hours(30));
        ReadingStore::new(&path).save(&[fresh, ancient]).unwrap();

        let newer = Reading::new(125, Trend::Up, now);
        let provider = Arc::new(MockProvider::builder().batch(vec![newer]).build());
        let monitor = GlucoseMonitor::with_store(
            provider,
            GlanceOptions::default(),
            ReadingStore::new(&path),
        );

        assert_eq!(monitor.load_stored().await.unwrap(), 1);
        assert_eq!(monitor.readings(), vec![fresh]);

        monitor.check_for_new_readings().await;
        monitor.flush().await.unwrap();
        assert_eq!(monitor.persisted_writes(), 1);
        assert_eq!(ReadingStore::new(&path).load().unwrap(), vec![newer, fresh]);
    }

    #[tokio::test]
    async fn test_unchanged_fetch_does_not_write() {
        let now = whole_seconds(OffsetDateTime::now_utc());
        let r0 = Reading::new(100, Trend::Flat, now);
        let provider = Arc::new(MockProvider::builder().batch(vec![r0]).batch(vec![r0]).build());
        let monitor = GlucoseMonitor::with_store(
            provider,
            GlanceOptions::default(),
            ReadingStore::open_in_memory().unwrap(),
        );
        monitor.load_stored().await.unwrap();

        monitor.check_for_new_readings().await;
        monitor.check_for_new_readings().await;
        monitor.flush().await.unwrap();
        assert_eq!(monitor.persisted_writes(), 1);
    }

    #[tokio::test]
    async fn test_suspending_saves_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.db");
        let r0 = Reading::new(100, Trend::Flat, whole_seconds(OffsetDateTime::now_utc()));
        let provider = Arc::new(MockProvider::builder().batch(vec![r0]).build());
        let monitor =
            GlucoseMonitor::with_store(provider, GlanceOptions::default(), ReadingStore::new(&path));
        monitor.load_stored().await.unwrap();

        monitor.set_suspending(true);
        monitor.check_for_new_readings().await;
        assert_eq!(monitor.persisted_writes(), 1);
        assert_eq!(ReadingStore::new(&path).load().unwrap(), vec![r0]);
    }

    #[tokio::test]
    async fn test_start_fetches_even_with_fresh_store() {
        let now = whole_seconds(OffsetDateTime::now_utc());
        let stored = Reading::new(120, Trend::Flat, now - time::Duration::minutes(1));
        let newer = Reading::new(124, Trend::Up, now);

        let mut store = ReadingStore::open_in_memory().unwrap();
        store.save(&[stored]).unwrap();

        let provider = Arc::new(MockProvider::builder().batch(vec![newer, stored]).build());
        let monitor = Arc::new(GlucoseMonitor::with_store(
            provider.clone(),
            GlanceOptions::default(),
            store,
        ));

        monitor.start().await.unwrap();
        assert_eq!(provider.fetch_count(), 1);
        assert_eq!(monitor.current_reading(), newer);
        assert!(monitor.is_poll_scheduled());

        monitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_reports_login_refusal() {
        let provider = Arc::new(MockProvider::builder().should_authenticate(false).build());
        let monitor = Arc::new(GlucoseMonitor::new(provider.clone(), GlanceOptions::default()));

        monitor.start().await.unwrap();
        assert_eq!(provider.fetch_count(), 1);
        assert!(monitor.last_error().is_some());

        monitor.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.db");
        std::fs::write(&path, vec![0x5A_u8; 8192]).unwrap();

        let monitor = Arc::new(GlucoseMonitor::with_store(
            Arc::new(MockProvider::default()),
            GlanceOptions::default(),
            ReadingStore::new(&path),
        ));
        assert!(matches!(monitor.start().await, Err(Error::Store(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_for_next_reading() {
        let fresh = Reading::new(100, Trend::Flat, OffsetDateTime::now_utc());
        let provider = Arc::new(MockProvider::builder().batch(vec![fresh]).build());
        let monitor = Arc::new(GlucoseMonitor::new(provider.clone(), GlanceOptions::default()));

        // First poll has nothing known, so it fetches and then arms a timer.
        monitor.poll().await;
        assert_eq!(provider.fetch_count(), 1);
        assert!(monitor.is_poll_scheduled());

        // A second trigger while the timer is pending does not fetch.
        monitor.poll().await;
        assert_eq!(provider.fetch_count(), 1);

        monitor.shutdown().await.unwrap();
        assert!(!monitor.is_poll_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_head_rearms_with_retry_interval() {
        let old = Reading::new(
            100,
            Trend::Flat,
            OffsetDateTime::now_utc() - time::Duration::hours(1),
        );
        let provider = Arc::new(MockProvider::builder().batch(vec![old]).build());
        let monitor = Arc::new(GlucoseMonitor::new(provider.clone(), GlanceOptions::default()));

        monitor.poll().await;
        assert_eq!(provider.fetch_count(), 1);
        assert!(monitor.is_poll_scheduled());

        // Nothing fires before the retry interval.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(provider.fetch_count(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(provider.fetch_count(), 2);
        assert!(monitor.is_poll_scheduled());

        monitor.shutdown().await.unwrap();
    }
}
