use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::records::LedgerEntry;
use crate::engine::types::SessionId;

/// Destination for session records. Writes are best effort.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn persist_event(&self, entry: &LedgerEntry) -> anyhow::Result<()>;
}

pub type SharedEventStore = Arc<dyn EventStore>;

/// Keeps every record in memory; used by tests and the simulator.
#[derive(Default)]
pub struct InMemoryEventStore {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().clone()
    }

    pub fn entries_for(&self, session_id: SessionId) -> Vec<LedgerEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn persist_event(&self, entry: &LedgerEntry) -> anyhow::Result<()> {
        self.entries.write().push(entry.clone());
        Ok(())
    }
}
