//! Single-writer persistence of the reading collection.
//!
//! All saves go through one blocking worker fed by a channel, so they reach
//! the store in the order they were queued. Callers either fire and forget
//! or wait for the write to land.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use glance_store::ReadingStore;
use glance_types::Reading;

use crate::error::{Error, Result};

enum Command {
    Save {
        readings: Vec<Reading>,
        ack: Option<oneshot::Sender<Result<bool>>>,
    },
    Flush {
        ack: oneshot::Sender<()>,
    },
}

/// Handle to the store worker. Dropping it lets the worker drain its queue and exit.
#[derive(Debug)]
pub(crate) struct StoreWriter {
    tx: mpsc::UnboundedSender<Command>,
    writes: Arc<AtomicU64>,
}

impl StoreWriter {
    /// Move `store` onto a blocking worker thread.
    pub(crate) fn spawn(mut store: ReadingStore) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let writes = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&writes);

        tokio::task::spawn_blocking(move || {
            debug!("Store writer started");
            while let Some(command) = rx.blocking_recv() {
                match command {
                    Command::Save { readings, ack } => {
                        let result = store.save(&readings).map_err(Error::from);
                        match &result {
                            Ok(true) => {
                                counter.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(false) => {}
                            Err(e) => error!("Failed to persist readings: {}", e),
                        }
                        if let Some(ack) = ack {
                            let _ = ack.send(result);
                        }
                    }
                    Command::Flush { ack } => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Store writer stopped");
        });

        Self { tx, writes }
    }

    /// Queue a save. With `wait`, returns a receiver that resolves once the
    /// write has been attempted.
    pub(crate) fn enqueue(
        &self,
        readings: Vec<Reading>,
        wait: bool,
    ) -> Option<oneshot::Receiver<Result<bool>>> {
        let (ack, rx) = if wait {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        if self.tx.send(Command::Save { readings, ack }).is_err() {
            error!("Store writer is gone, dropping save");
            return None;
        }
        rx
    }

    /// Wait until everything queued so far has been written.
    pub(crate) async fn flush(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush { ack })
            .map_err(|_| Error::Task("store writer stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Task("store writer stopped".to_string()))
    }

    /// Number of saves that actually changed the store.
    pub(crate) fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Wait for a queued save to complete.
pub(crate) async fn await_save(rx: oneshot::Receiver<Result<bool>>) -> Result<bool> {
    rx.await
        .map_err(|_| Error::Task("store writer dropped a save".to_string()))?
}
