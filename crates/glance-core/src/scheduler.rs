//! Deferred polling.
//!
//! New readings appear on the share service roughly every five minutes, so
//! there is no point asking before the newest known reading is an
//! automatic-fetch interval old. [`plan`] works out when the next poll is
//! due and [`PollScheduler`] holds at most one pending timer for it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use glance_types::Reading;

/// When the next poll should happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPlan {
    /// The newest reading is overdue (or there is none): fetch now.
    FetchNow,
    /// Nothing new is expected yet: poll again after this long.
    WaitFor(Duration),
}

/// Decide whether to fetch now or wait, given the newest known reading.
///
/// ```
/// use std::time::Duration;
/// use glance_core::scheduler::{plan, PollPlan};
/// use glance_types::{Reading, Trend};
/// use time::macros::datetime;
///
/// let latest = Reading::new(100, Trend::Flat, datetime!(2024-05-01 12:00 UTC));
/// let now = datetime!(2024-05-01 12:02 UTC);
/// assert_eq!(
///     plan(Some(&latest), now, Duration::from_secs(320)),
///     PollPlan::WaitFor(Duration::from_secs(200)),
/// );
/// ```
pub fn plan(latest: Option<&Reading>, now: OffsetDateTime, interval: Duration) -> PollPlan {
    let Some(latest) = latest else {
        return PollPlan::FetchNow;
    };
    let next_allowed = latest.timestamp() + interval;
    if now < next_allowed {
        // Positive by the comparison above.
        PollPlan::WaitFor(Duration::try_from(next_allowed - now).unwrap_or(Duration::ZERO))
    } else {
        PollPlan::FetchNow
    }
}

/// Holds at most one pending deferred poll.
///
/// The `scheduled` flag is raised just before a timer is armed and lowered
/// as soon as it fires, before the deferred work starts, so triggers that
/// overlap a pending timer collapse into it.
#[derive(Debug, Default)]
pub struct PollScheduler {
    scheduled: Arc<AtomicBool>,
    pending: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a timer is currently pending.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `task` after `delay` unless a timer is already pending.
    ///
    /// Returns `false` (dropping `task` unpolled) when a timer was already
    /// pending or the scheduler has been cancelled. Must be called from
    /// within a Tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.scheduled.swap(true, Ordering::SeqCst) {
            debug!("Poll already scheduled, not arming another timer");
            return false;
        }

        debug!("Scheduling poll in {:?}", delay);
        let scheduled = Arc::clone(&self.scheduled);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    scheduled.store(false, Ordering::SeqCst);
                }
                _ = tokio::time::sleep(delay) => {
                    scheduled.store(false, Ordering::SeqCst);
                    task.await;
                }
            }
        });

        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Cancel any pending timer and refuse future ones.
    ///
    /// A poll that already started is left to finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let handle = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if self.scheduled.swap(false, Ordering::SeqCst)
            && let Some(handle) = handle
        {
            handle.abort();
        }
    }
}
