use crate::persistence::StoreError;
use super::value_objects::{CounterId, HISTORY_CAPACITY, MAX_VALUE};

// ============================================================================
// Counter Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("Counter full, use POST /reset")]
    IncrementFailed,

    #[error("Counter is at zero, cannot decrement")]
    DecrementFailed,

    #[error("Counter value {0} is outside 0..={max}", max = MAX_VALUE)]
    ValueOutOfRange(u32),

    #[error("History window holds {0} entries, capacity is {cap}", cap = HISTORY_CAPACITY)]
    HistoryOverflow(usize),

    #[error("Unknown history action: {0}")]
    UnknownAction(String),
}

// ============================================================================
// Counter Saga Errors
// ============================================================================

/// Failures surfaced by the counter command handler
#[derive(Debug, thiserror::Error)]
pub enum CounterServiceError {
    /// Business rule rejected the transition; no store was touched
    #[error(transparent)]
    Domain(#[from] CounterError),

    /// A store call failed; any committed counter write was rolled back
    #[error(transparent)]
    Store(#[from] StoreError),

    /// History write failed and the compensating counter write failed too.
    /// The counter value and its audit trail have diverged.
    #[error(
        "Counter {counter_id} left inconsistent: history write failed ({history}), \
         compensating counter write failed ({compensation})"
    )]
    CompensationFailed {
        counter_id: CounterId,
        history: StoreError,
        compensation: StoreError,
    },
}

impl CounterServiceError {
    pub fn is_increment_rejected(&self) -> bool {
        matches!(self, CounterServiceError::Domain(CounterError::IncrementFailed))
    }

    pub fn is_unresolved_inconsistency(&self) -> bool {
        matches!(self, CounterServiceError::CompensationFailed { .. })
    }
}
