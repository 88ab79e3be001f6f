use async_trait::async_trait;

use crate::domain::counter::{CounterAggregate, CounterId, HistoryRecord};
use crate::utils::IsTransient;

// ============================================================================
// Storage Ports - What the counter core needs from a database
// ============================================================================
//
// The two stores are independent: there is no shared transaction between a
// counter snapshot write and a history append. Keeping them coherent is the
// job of the counter command handler, not of the stores.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Corrupt stored record: {0}")]
    Corrupt(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed storage for the current counter snapshot
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get_by_id(&self, id: &CounterId) -> StoreResult<Option<CounterAggregate>>;

    /// Upsert by counter id
    async fn save(&self, counter: &CounterAggregate) -> StoreResult<()>;
}

/// Append-only storage for history records
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Records for `id`, most recent first, at most `limit` of them
    async fn get_all(&self, id: &CounterId, limit: Option<usize>) -> StoreResult<Vec<HistoryRecord>>;

    async fn save(&self, record: &HistoryRecord) -> StoreResult<()>;
}
