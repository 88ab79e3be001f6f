use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use crate::config::ConsistencyMode;
use crate::domain::history::HistoryQueryService;
use crate::metrics::Metrics;
use crate::persistence::{CounterStore, StoreError};
use crate::utils::KeyedLocks;

use super::aggregate::CounterAggregate;
use super::commands::CounterCommand;
use super::errors::CounterServiceError;
use super::value_objects::{CounterId, HistoryEntry};

// ============================================================================
// Counter Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Counter Store → History Store
//
// The two stores share no transaction. The counter snapshot is written first;
// if the history append then fails, a compensating snapshot is written back
// exactly once and the history error is returned. If the compensation fails
// as well, both errors are returned as `CompensationFailed`.
//
// Once the counter write has succeeded the saga always runs to completion;
// it is never abandoned between steps.
//
// ============================================================================

pub struct CounterCommandHandler {
    counters: Arc<dyn CounterStore>,
    history: Arc<HistoryQueryService>,
    locks: Option<KeyedLocks<CounterId>>,
    metrics: Arc<Metrics>,
}

impl CounterCommandHandler {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        history: Arc<HistoryQueryService>,
        consistency: ConsistencyMode,
        metrics: Arc<Metrics>,
    ) -> Self {
        let locks = match consistency {
            ConsistencyMode::PerKeyLock => Some(KeyedLocks::new()),
            ConsistencyMode::LastWriterWins => None,
        };

        Self {
            counters,
            history,
            locks,
            metrics,
        }
    }

    /// Current snapshot, created and persisted on first access
    pub async fn get_current_counter(&self, id: &CounterId) -> Result<CounterAggregate, CounterServiceError> {
        let _guard = self.acquire(id).await;
        Ok(self.load_or_create(id).await?)
    }

    pub async fn increment_counter(&self, id: &CounterId) -> Result<CounterAggregate, CounterServiceError> {
        self.handle(id, CounterCommand::Increment).await
    }

    pub async fn reset_counter(&self, id: &CounterId) -> Result<CounterAggregate, CounterServiceError> {
        self.handle(id, CounterCommand::Reset).await
    }

    /// Run one command through the saga and record its outcome
    pub async fn handle(
        &self,
        id: &CounterId,
        command: CounterCommand,
    ) -> Result<CounterAggregate, CounterServiceError> {
        let operation = command.name();
        let _guard = self.acquire(id).await;
        let _timer = self.metrics.saga_duration.with_label_values(&[operation]).start_timer();

        let result = self.execute(id, command).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(CounterServiceError::Domain(_)) => "rejected",
            Err(CounterServiceError::Store(_)) => "store_error",
            Err(CounterServiceError::CompensationFailed { .. }) => "inconsistent",
        };
        self.metrics.operations.with_label_values(&[operation, outcome]).inc();

        result
    }

    async fn execute(
        &self,
        id: &CounterId,
        command: CounterCommand,
    ) -> Result<CounterAggregate, CounterServiceError> {
        let current = self.load_or_create(id).await?;

        // Transition and its inverse, both computed before any store is touched
        let (next, compensation) = match command {
            CounterCommand::Increment => {
                let next = current.increment()?;
                let compensation = next.decrement().unwrap_or_else(|_| current.clone());
                (next, compensation)
            }
            CounterCommand::Reset => (current.reset(), current),
        };

        if let Err(e) = self.counters.save(&next).await {
            tracing::warn!(
                counter_id = %id,
                operation = command.name(),
                error = %e,
                "Counter write failed, nothing to roll back"
            );
            return Err(e.into());
        }

        let entry = next
            .latest_entry()
            .cloned()
            .unwrap_or_else(|| HistoryEntry::now(command.action()));

        match self.history.record(id, &entry).await {
            Ok(_) => {
                tracing::info!(
                    counter_id = %id,
                    operation = command.name(),
                    value = next.value(),
                    "✅ Counter updated"
                );
                Ok(next)
            }
            Err(history_error) => self.compensate(id, command, &compensation, history_error).await,
        }
    }

    async fn compensate(
        &self,
        id: &CounterId,
        command: CounterCommand,
        compensation: &CounterAggregate,
        history_error: StoreError,
    ) -> Result<CounterAggregate, CounterServiceError> {
        let operation = command.name();

        tracing::warn!(
            counter_id = %id,
            operation = operation,
            error = %history_error,
            restore_value = compensation.value(),
            "History write failed, rolling back counter"
        );
        self.metrics.compensations.with_label_values(&[operation]).inc();

        match self.counters.save(compensation).await {
            Ok(()) => {
                tracing::info!(
                    counter_id = %id,
                    operation = operation,
                    value = compensation.value(),
                    "↩️ Counter rolled back"
                );
                Err(CounterServiceError::Store(history_error))
            }
            Err(compensation_error) => {
                tracing::error!(
                    counter_id = %id,
                    operation = operation,
                    history_error = %history_error,
                    compensation_error = %compensation_error,
                    "💀 Rollback failed: counter and history have diverged, operator attention required"
                );
                self.metrics.compensation_failures.with_label_values(&[operation]).inc();

                Err(CounterServiceError::CompensationFailed {
                    counter_id: id.clone(),
                    history: history_error,
                    compensation: compensation_error,
                })
            }
        }
    }

    async fn load_or_create(&self, id: &CounterId) -> Result<CounterAggregate, StoreError> {
        if let Some(existing) = self.counters.get_by_id(id).await? {
            return Ok(existing);
        }

        let created = CounterAggregate::create_new(id.clone());
        self.counters.save(&created).await?;

        tracing::info!(counter_id = %id, "Created new counter");
        Ok(created)
    }

    async fn acquire(&self, id: &CounterId) -> Option<OwnedMutexGuard<()>> {
        match &self.locks {
            Some(locks) => Some(locks.lock(id).await),
            None => None,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::counter::{CounterError, HistoryAction, MAX_VALUE};
    use crate::persistence::test_support::{FlakyCounterStore, FlakyHistoryStore};
    use crate::persistence::{InMemoryCounterStore, InMemoryHistoryStore};
    use futures_util::future::join_all;
    use std::time::Duration;

    struct Harness {
        counters: Arc<FlakyCounterStore>,
        history_store: Arc<FlakyHistoryStore>,
        history: Arc<HistoryQueryService>,
        metrics: Arc<Metrics>,
        handler: CounterCommandHandler,
    }

    fn harness(consistency: ConsistencyMode) -> Harness {
        let counters = Arc::new(FlakyCounterStore::default());
        let history_store = Arc::new(FlakyHistoryStore::default());
        let history = Arc::new(HistoryQueryService::new(history_store.clone()));
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = CounterCommandHandler::new(counters.clone(), history.clone(), consistency, metrics.clone());

        Harness {
            counters,
            history_store,
            history,
            metrics,
            handler,
        }
    }

    fn injected(msg: &str) -> StoreError {
        StoreError::Unavailable(msg.to_string())
    }

    async fn stored_value(h: &Harness, id: &CounterId) -> u32 {
        h.counters.get_by_id(id).await.unwrap().unwrap().value()
    }

    async fn advance_to(h: &Harness, id: &CounterId, value: u32) {
        for _ in 0..value {
            h.handler.increment_counter(id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_get_current_counter_creates_and_persists() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("fresh");

        let counter = h.handler.get_current_counter(&id).await.unwrap();

        assert_eq!(counter.value(), 0);
        assert_eq!(counter.history().len(), 1);
        assert_eq!(counter.history()[0].action, HistoryAction::Initial);
        assert_eq!(h.counters.save_calls(), 1);

        // Second call loads, does not save again
        let again = h.handler.get_current_counter(&id).await.unwrap();
        assert_eq!(again, counter);
        assert_eq!(h.counters.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creation_converges() {
        for mode in [ConsistencyMode::PerKeyLock, ConsistencyMode::LastWriterWins] {
            let h = harness(mode);
            let id = CounterId::new("racy");

            let results = join_all((0..8).map(|_| h.handler.get_current_counter(&id))).await;

            for result in results {
                assert_eq!(result.unwrap().value(), 0);
            }
            assert_eq!(stored_value(&h, &id).await, 0);
        }
    }

    #[tokio::test]
    async fn test_increment_success_records_one_entry() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 4).await;

        let counter = h.handler.increment_counter(&id).await.unwrap();

        assert_eq!(counter.value(), 5);
        assert_eq!(stored_value(&h, &id).await, 5);

        let history = h.history.get_history(&id, None).await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|e| e.action == HistoryAction::Increment));
        assert_eq!(&history[0], counter.latest_entry().unwrap());
    }

    #[tokio::test]
    async fn test_increment_at_max_touches_no_store() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("full");
        advance_to(&h, &id, MAX_VALUE).await;
        let counter_saves = h.counters.save_calls();
        let history_saves = h.history_store.save_calls();

        let result = h.handler.increment_counter(&id).await;

        assert!(matches!(result, Err(CounterServiceError::Domain(CounterError::IncrementFailed))));
        assert!(result.unwrap_err().is_increment_rejected());
        assert_eq!(h.counters.save_calls(), counter_saves);
        assert_eq!(h.history_store.save_calls(), history_saves);
        assert_eq!(stored_value(&h, &id).await, MAX_VALUE);
    }

    #[tokio::test]
    async fn test_counter_write_failure_propagates_without_history() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 2).await;
        h.counters.fail_next_save(injected("counter down"));

        let result = h.handler.increment_counter(&id).await;

        assert!(matches!(result, Err(CounterServiceError::Store(ref e)) if *e == injected("counter down")));
        assert_eq!(stored_value(&h, &id).await, 2);
        assert_eq!(h.history.get_history(&id, None).await.unwrap().len(), 2);
        assert_eq!(h.metrics.compensations.with_label_values(&["increment"]).get(), 0);
    }

    #[tokio::test]
    async fn test_history_failure_rolls_back_increment() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 10).await;
        let before = h.counters.get_by_id(&id).await.unwrap().unwrap();
        h.history_store.fail_next_save(injected("history down"));

        let result = h.handler.increment_counter(&id).await;

        assert!(matches!(result, Err(CounterServiceError::Store(ref e)) if *e == injected("history down")));
        let after = h.counters.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(after.value(), 10);
        assert_eq!(after.history().back(), before.history().back());
        assert_eq!(h.history.get_history(&id, None).await.unwrap().len(), 10);
        assert_eq!(h.metrics.compensations.with_label_values(&["increment"]).get(), 1);
        assert_eq!(h.metrics.operations.with_label_values(&["increment", "store_error"]).get(), 1);

        // The next attempt goes through normally
        let counter = h.handler.increment_counter(&id).await.unwrap();
        assert_eq!(counter.value(), 11);
    }

    #[tokio::test]
    async fn test_failed_rollback_surfaces_both_errors() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 3).await;

        h.counters.pass_next_save();
        h.counters.fail_next_save(injected("compensation down"));
        h.history_store.fail_next_save(injected("history down"));

        let err = h.handler.increment_counter(&id).await.unwrap_err();

        assert!(err.is_unresolved_inconsistency());
        match err {
            CounterServiceError::CompensationFailed { counter_id, history, compensation } => {
                assert_eq!(counter_id, id);
                assert_eq!(history, injected("history down"));
                assert_eq!(compensation, injected("compensation down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Detected but unresolved: counter kept the increment, history did not
        assert_eq!(stored_value(&h, &id).await, 4);
        assert_eq!(h.history.get_history(&id, None).await.unwrap().len(), 3);
        assert_eq!(h.metrics.compensation_failures.with_label_values(&["increment"]).get(), 1);
    }

    #[tokio::test]
    async fn test_failed_reset_rollback_surfaces_both_errors() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("r");
        advance_to(&h, &id, 5).await;

        h.counters.pass_next_save();
        h.counters.fail_next_save(StoreError::Backend("restore down".to_string()));
        h.history_store.fail_next_save(injected("history down"));

        let err = h.handler.reset_counter(&id).await.unwrap_err();

        assert!(err.is_unresolved_inconsistency());
        match err {
            CounterServiceError::CompensationFailed { counter_id, history, compensation } => {
                assert_eq!(counter_id, id);
                assert_eq!(history, injected("history down"));
                assert_eq!(compensation, StoreError::Backend("restore down".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Reset kept in the counter store, never recorded in history
        assert_eq!(stored_value(&h, &id).await, 0);
        let history = h.history.get_history(&id, None).await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|e| e.action == HistoryAction::Increment));

        assert_eq!(h.metrics.compensations.with_label_values(&["reset"]).get(), 1);
        assert_eq!(h.metrics.compensation_failures.with_label_values(&["reset"]).get(), 1);
        assert_eq!(h.metrics.compensation_failures.with_label_values(&["increment"]).get(), 0);
        assert_eq!(h.metrics.operations.with_label_values(&["reset", "inconsistent"]).get(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_never_recreates_counter() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 5).await;
        let saves_before = h.counters.save_calls();

        h.counters.fail_next_load(StoreError::Corrupt("not a rows result".to_string()));

        let err = h.handler.increment_counter(&id).await.unwrap_err();

        assert!(matches!(err, CounterServiceError::Store(StoreError::Corrupt(_))));
        assert_eq!(h.counters.save_calls(), saves_before);
        assert_eq!(stored_value(&h, &id).await, 5);
        assert_eq!(h.metrics.operations.with_label_values(&["increment", "store_error"]).get(), 1);
    }

    #[tokio::test]
    async fn test_saga_duration_excludes_lock_wait() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        let held = h.handler.locks.as_ref().unwrap().lock(&id).await;
        let release = async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(held);
        };

        let (result, ()) = tokio::join!(h.handler.increment_counter(&id), release);
        assert_eq!(result.unwrap().value(), 1);

        let histogram = h.metrics.saga_duration.with_label_values(&["increment"]);
        assert_eq!(histogram.get_sample_count(), 1);
        assert!(histogram.get_sample_sum() < 0.2, "lock wait was timed: {}", histogram.get_sample_sum());
    }

    #[tokio::test]
    async fn test_compensation_attempted_exactly_once() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 1).await;
        let saves_before = h.counters.save_calls();

        h.counters.pass_next_save();
        h.counters.fail_next_save(injected("compensation down"));
        h.counters.fail_next_save(injected("would be a retry"));
        h.history_store.fail_next_save(injected("history down"));

        let _ = h.handler.increment_counter(&id).await;

        // One forward write, one compensating write
        assert_eq!(h.counters.save_calls(), saves_before + 2);
    }

    #[tokio::test]
    async fn test_reset_success() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 57).await;

        let counter = h.handler.reset_counter(&id).await.unwrap();

        assert_eq!(counter.value(), 0);
        assert_eq!(stored_value(&h, &id).await, 0);
        let latest = h.history.get_history(&id, Some(1)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].action, HistoryAction::Reset);
    }

    #[tokio::test]
    async fn test_history_failure_restores_value_before_reset() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("c");
        advance_to(&h, &id, 42).await;
        let before = h.counters.get_by_id(&id).await.unwrap().unwrap();
        h.history_store.fail_next_save(injected("history down"));

        let result = h.handler.reset_counter(&id).await;

        assert!(matches!(result, Err(CounterServiceError::Store(ref e)) if *e == injected("history down")));
        assert_eq!(h.counters.get_by_id(&id).await.unwrap().unwrap(), before);
        assert_eq!(h.metrics.compensations.with_label_values(&["reset"]).get(), 1);
    }

    #[tokio::test]
    async fn test_reset_on_missing_counter_creates_it() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("new");

        let counter = h.handler.reset_counter(&id).await.unwrap();

        assert_eq!(counter.value(), 0);
        let actions: Vec<_> = counter.history().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![HistoryAction::Initial, HistoryAction::Reset]);
    }

    #[tokio::test]
    async fn test_per_key_lock_prevents_lost_updates() {
        let counters = Arc::new(InMemoryCounterStore::new());
        let history = Arc::new(HistoryQueryService::new(Arc::new(InMemoryHistoryStore::new())));
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = Arc::new(CounterCommandHandler::new(
            counters.clone(),
            history.clone(),
            ConsistencyMode::PerKeyLock,
            metrics,
        ));
        let id = CounterId::new("hot");

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let handler = handler.clone();
                let id = id.clone();
                tokio::spawn(async move { handler.increment_counter(&id).await })
            })
            .collect();

        for result in join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(counters.get_by_id(&id).await.unwrap().unwrap().value(), 50);
        assert_eq!(history.get_history(&id, None).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_counters_are_independent() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let a = CounterId::new("a");
        let b = CounterId::new("b");

        advance_to(&h, &a, 3).await;
        h.handler.increment_counter(&b).await.unwrap();
        h.handler.reset_counter(&a).await.unwrap();

        assert_eq!(stored_value(&h, &a).await, 0);
        assert_eq!(stored_value(&h, &b).await, 1);
        assert_eq!(h.history.get_history(&b, None).await.unwrap().len(), 1);
    }

    // ------------------------------------------------------------------------
    // End-to-end scenarios
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_fill_to_max() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("e2e");

        assert_eq!(h.handler.get_current_counter(&id).await.unwrap().value(), 0);

        let mut last = None;
        for _ in 0..MAX_VALUE {
            last = Some(h.handler.increment_counter(&id).await.unwrap());
        }
        assert_eq!(last.unwrap().value(), 100);

        let result = h.handler.increment_counter(&id).await;
        assert!(matches!(result, Err(CounterServiceError::Domain(CounterError::IncrementFailed))));
        assert_eq!(stored_value(&h, &id).await, 100);
    }

    #[tokio::test]
    async fn test_scenario_rollback_at_ten() {
        let h = harness(ConsistencyMode::LastWriterWins);
        let id = CounterId::new("e2e");
        advance_to(&h, &id, 10).await;
        h.history_store.fail_next_save(injected("injected"));

        let err = h.handler.increment_counter(&id).await.unwrap_err();

        assert!(matches!(err, CounterServiceError::Store(StoreError::Unavailable(ref m)) if m == "injected"));
        assert_eq!(stored_value(&h, &id).await, 10);
    }

    #[tokio::test]
    async fn test_scenario_reset_then_latest_history() {
        let h = harness(ConsistencyMode::PerKeyLock);
        let id = CounterId::new("e2e");
        advance_to(&h, &id, 57).await;

        let counter = h.handler.reset_counter(&id).await.unwrap();
        assert_eq!(counter.value(), 0);

        let history = h.history.get_history(&id, Some(1)).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Reset);
    }
}
