use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::records::LedgerEntry;
use super::store::SharedEventStore;
use crate::tokio_tools::spawn_named_task;

const LOG_TARGET: &str = "truth_wars::ledger::worker";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger worker has stopped")]
    ChannelClosed,
}

/// Fire-and-forget handle used by sessions. Never waits on the store.
#[derive(Clone)]
pub struct LedgerSink {
    tx: mpsc::UnboundedSender<LedgerEntry>,
}

impl LedgerSink {
    pub fn submit(&self, entries: Vec<LedgerEntry>) -> Result<(), LedgerError> {
        for entry in entries {
            self.tx
                .send(entry)
                .map_err(|_| LedgerError::ChannelClosed)?;
        }
        Ok(())
    }

    /// A sink whose records go nowhere.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }
}

/// Drains submitted records into the event store on a background task.
pub struct LedgerWorker {
    store: SharedEventStore,
    rx: mpsc::UnboundedReceiver<LedgerEntry>,
    failures: Arc<AtomicU64>,
}

impl LedgerWorker {
    pub fn new(store: SharedEventStore) -> (Self, LedgerSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            store,
            rx,
            failures: Arc::new(AtomicU64::new(0)),
        };
        (worker, LedgerSink { tx })
    }

    /// Count of writes the store refused.
    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failures)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        spawn_named_task("ledger-worker", self.run())
    }

    pub async fn run(mut self) {
        let mut written = 0u64;
        while let Some(entry) = self.rx.recv().await {
            match self.store.persist_event(&entry).await {
                Ok(()) => {
                    written += 1;
                    debug!(
                        target: LOG_TARGET,
                        session_id = %entry.session_id,
                        record = entry.record.name(),
                        "record persisted"
                    );
                }
                Err(err) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: LOG_TARGET,
                        session_id = %entry.session_id,
                        record = entry.record.name(),
                        error = %err,
                        "failed to persist record"
                    );
                }
            }
        }
        info!(target: LOG_TARGET, written, "ledger worker stopped");
    }
}
