// ============================================================================
// Persistence - Counter and History Stores
// ============================================================================
//
// Ports (traits) the counter core depends on, plus adapters:
// - memory: process-local, for development and tests
// - scylla: ScyllaDB tables
//
// ============================================================================

pub mod ports;
pub mod memory;
pub mod scylla;

#[cfg(test)]
pub(crate) mod test_support;

pub use ports::{CounterStore, HistoryStore, StoreError, StoreResult};
pub use memory::{InMemoryCounterStore, InMemoryHistoryStore};
pub use self::scylla::{ensure_schema, ScyllaCounterStore, ScyllaHistoryStore};
