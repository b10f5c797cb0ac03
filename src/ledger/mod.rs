pub mod records;
pub mod store;
pub mod worker;

pub use records::{LedgerEntry, LedgerRecord};
pub use store::{EventStore, InMemoryEventStore, SharedEventStore};
pub use worker::{LedgerError, LedgerSink, LedgerWorker};
