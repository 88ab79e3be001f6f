use std::sync::Arc;

use crate::domain::counter::{CounterId, HistoryEntry, HistoryRecord};
use crate::persistence::{HistoryStore, StoreResult};

// ============================================================================
// History Query Service
// ============================================================================
//
// Read side of the audit trail, plus the single write path the counter
// command handler uses to record entries. Reads are not serialized with the
// counter saga and may miss an entry whose write is still in flight.
//
// ============================================================================

pub struct HistoryQueryService {
    store: Arc<dyn HistoryStore>,
}

impl HistoryQueryService {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Entries for `id`, most recent first; all of them when `limit` is `None`
    pub async fn get_history(&self, id: &CounterId, limit: Option<usize>) -> StoreResult<Vec<HistoryEntry>> {
        let records = self.store.get_all(id, limit).await?;

        Ok(records
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(HistoryRecord::entry)
            .collect())
    }

    /// Append `entry` to the durable trail of counter `id`
    pub async fn record(&self, id: &CounterId, entry: &HistoryEntry) -> StoreResult<HistoryRecord> {
        let record = HistoryRecord::new(id.clone(), entry);
        self.store.save(&record).await?;

        tracing::debug!(
            counter_id = %id,
            action = %record.action,
            timestamp = %record.timestamp,
            "Recorded history entry"
        );

        Ok(record)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
