use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::counter::{CounterAggregate, CounterId, HistoryRecord};
use super::memory::{InMemoryCounterStore, InMemoryHistoryStore};
use super::ports::{CounterStore, HistoryStore, StoreError, StoreResult};

// ============================================================================
// Fault-Injecting Stores (tests only)
// ============================================================================
//
// Wrap the in-memory stores and fail scripted `save` calls. Each save pops
// the next scripted outcome; once the script is empty every save passes
// through to the inner store. Counter loads can be failed the same way.
//
// ============================================================================

#[derive(Default)]
struct SaveScript {
    outcomes: Mutex<VecDeque<Option<StoreError>>>,
    saves: AtomicUsize,
}

impl SaveScript {
    fn push(&self, outcome: Option<StoreError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    fn next(&self) -> Option<StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().pop_front().flatten()
    }
}

#[derive(Default)]
pub struct FlakyCounterStore {
    inner: InMemoryCounterStore,
    script: SaveScript,
    load_failures: Mutex<VecDeque<StoreError>>,
}

impl FlakyCounterStore {
    /// Let the next save through
    pub fn pass_next_save(&self) {
        self.script.push(None);
    }

    pub fn fail_next_save(&self, error: StoreError) {
        self.script.push(Some(error));
    }

    pub fn save_calls(&self) -> usize {
        self.script.saves.load(Ordering::SeqCst)
    }

    pub fn fail_next_load(&self, error: StoreError) {
        self.load_failures.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl CounterStore for FlakyCounterStore {
    async fn get_by_id(&self, id: &CounterId) -> StoreResult<Option<CounterAggregate>> {
        if let Some(error) = self.load_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.inner.get_by_id(id).await
    }

    async fn save(&self, counter: &CounterAggregate) -> StoreResult<()> {
        match self.script.next() {
            Some(error) => Err(error),
            None => self.inner.save(counter).await,
        }
    }
}

#[derive(Default)]
pub struct FlakyHistoryStore {
    inner: InMemoryHistoryStore,
    script: SaveScript,
}

impl FlakyHistoryStore {
    pub fn fail_next_save(&self, error: StoreError) {
        self.script.push(Some(error));
    }

    pub fn save_calls(&self) -> usize {
        self.script.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for FlakyHistoryStore {
    async fn get_all(&self, id: &CounterId, limit: Option<usize>) -> StoreResult<Vec<HistoryRecord>> {
        self.inner.get_all(id, limit).await
    }

    async fn save(&self, record: &HistoryRecord) -> StoreResult<()> {
        match self.script.next() {
            Some(error) => Err(error),
            None => self.inner.save(record).await,
        }
    }
}
