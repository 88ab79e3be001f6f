use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::counter::{CounterAggregate, CounterId, HistoryRecord};
use super::ports::{CounterStore, HistoryStore, StoreResult};

// ============================================================================
// In-Memory Stores
// ============================================================================
//
// Process-local stores for development runs and tests. Same contract as the
// ScyllaDB adapters: upsert-by-id for counters, append-only for history.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: RwLock<HashMap<CounterId, CounterAggregate>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get_by_id(&self, id: &CounterId) -> StoreResult<Option<CounterAggregate>> {
        Ok(self.counters.read().await.get(id).cloned())
    }

    async fn save(&self, counter: &CounterAggregate) -> StoreResult<()> {
        self.counters
            .write()
            .await
            .insert(counter.id().clone(), counter.clone());

        tracing::trace!(counter_id = %counter.id(), value = counter.value(), "Saved counter in memory");
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_all(&self, id: &CounterId, limit: Option<usize>) -> StoreResult<Vec<HistoryRecord>> {
        let records = self.records.read().await;

        // Newest appended first; the stable sort keeps that order for equal timestamps
        let mut matching: Vec<HistoryRecord> = records
            .iter()
            .rev()
            .filter(|record| &record.counter_id == id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = limit {
            matching.truncate(limit);
        }

        Ok(matching)
    }

    async fn save(&self, record: &HistoryRecord) -> StoreResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
