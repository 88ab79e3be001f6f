use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::session::Session;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::counter::{CounterAggregate, CounterId, HistoryAction, HistoryEntry, HistoryRecord};
use crate::utils::{retry_on_transient, RetryConfig};
use super::ports::{CounterStore, HistoryStore, StoreError, StoreResult};

// ============================================================================
// ScyllaDB Stores
// ============================================================================
//
// Two independent tables, no batch across them:
// - counters:        one row per counter id (upsert), embedded history window as JSON
// - counter_history: append-only, clustered newest first
//
// Driver failures are retried here with exponential backoff. Whatever
// survives the retry budget is handed to the caller unchanged.
//
// ============================================================================

/// Create keyspace and tables if missing, then switch the session to the keyspace
pub async fn ensure_schema(session: &Session, keyspace: &str) -> StoreResult<()> {
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                keyspace
            ),
            &[],
        )
        .await
        .map_err(backend)?;

    session.use_keyspace(keyspace, false).await.map_err(backend)?;

    session
        .query_unpaged(
            "CREATE TABLE IF NOT EXISTS counters (
                id text PRIMARY KEY,
                value int,
                history text
            )",
            &[],
        )
        .await
        .map_err(backend)?;

    session
        .query_unpaged(
            "CREATE TABLE IF NOT EXISTS counter_history (
                counter_id text,
                timestamp timestamp,
                entry_id uuid,
                action text,
                PRIMARY KEY ((counter_id), timestamp, entry_id)
            ) WITH CLUSTERING ORDER BY (timestamp DESC, entry_id DESC)",
            &[],
        )
        .await
        .map_err(backend)?;

    tracing::info!(keyspace = %keyspace, "✅ ScyllaDB schema ready");
    Ok(())
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

/// Clustering tiebreak for history rows.
///
/// The `timestamp` column only keeps milliseconds, so entries written within
/// the same millisecond are ordered by `entry_id`. UUIDv7 ids are monotonic
/// within the process and compare in generation order.
fn next_entry_id() -> Uuid {
    Uuid::now_v7()
}

// ============================================================================
// Counter Store
// ============================================================================

pub struct ScyllaCounterStore {
    session: Arc<Session>,
    retry: RetryConfig,
}

impl ScyllaCounterStore {
    pub fn new(session: Arc<Session>, retry: RetryConfig) -> Self {
        Self { session, retry }
    }

    async fn fetch(&self, id: &CounterId) -> StoreResult<Option<CounterAggregate>> {
        let result = self.session
            .query_unpaged(
                "SELECT value, history FROM counters WHERE id = ?",
                (id.as_str(),),
            )
            .await
            .map_err(unavailable)?;

        let rows_result = result.into_rows_result().map_err(corrupt)?;

        let Some((value, history_json)) = rows_result
            .maybe_first_row::<(i32, Option<String>)>()
            .map_err(corrupt)?
        else {
            return Ok(None);
        };

        let value = u32::try_from(value)
            .map_err(|_| StoreError::Corrupt(format!("negative value {} for counter {}", value, id)))?;
        let history: Vec<HistoryEntry> = match history_json {
            Some(json) => serde_json::from_str(&json).map_err(corrupt)?,
            None => Vec::new(),
        };

        CounterAggregate::from_snapshot(id.clone(), value, history)
            .map(Some)
            .map_err(corrupt)
    }

    async fn upsert(&self, counter: &CounterAggregate) -> StoreResult<()> {
        let value = i32::try_from(counter.value()).map_err(corrupt)?;
        let history_json = serde_json::to_string(counter.history()).map_err(corrupt)?;

        self.session
            .query_unpaged(
                "INSERT INTO counters (id, value, history) VALUES (?, ?, ?)",
                (counter.id().as_str(), value, history_json),
            )
            .await
            .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait]
impl CounterStore for ScyllaCounterStore {
    async fn get_by_id(&self, id: &CounterId) -> StoreResult<Option<CounterAggregate>> {
        retry_on_transient(&self.retry, |_attempt| self.fetch(id))
            .await
            .into_result()
    }

    async fn save(&self, counter: &CounterAggregate) -> StoreResult<()> {
        retry_on_transient(&self.retry, |_attempt| self.upsert(counter))
            .await
            .into_result()?;

        tracing::debug!(
            counter_id = %counter.id(),
            value = counter.value(),
            "Saved counter snapshot"
        );
        Ok(())
    }
}

// ============================================================================
// History Store
// ============================================================================

pub struct ScyllaHistoryStore {
    session: Arc<Session>,
    retry: RetryConfig,
}

impl ScyllaHistoryStore {
    pub fn new(session: Arc<Session>, retry: RetryConfig) -> Self {
        Self { session, retry }
    }

    async fn fetch(&self, id: &CounterId, limit: Option<usize>) -> StoreResult<Vec<HistoryRecord>> {
        let result = match limit {
            Some(limit) => {
                let limit = i32::try_from(limit).unwrap_or(i32::MAX);
                self.session
                    .query_unpaged(
                        "SELECT action, timestamp FROM counter_history WHERE counter_id = ? LIMIT ?",
                        (id.as_str(), limit),
                    )
                    .await
            }
            None => {
                self.session
                    .query_unpaged(
                        "SELECT action, timestamp FROM counter_history WHERE counter_id = ?",
                        (id.as_str(),),
                    )
                    .await
            }
        }
        .map_err(unavailable)?;

        let rows_result = result.into_rows_result().map_err(corrupt)?;
        let mut records = Vec::new();

        for row in rows_result.rows::<(String, DateTime<Utc>)>().map_err(corrupt)? {
            let (action, timestamp) = row.map_err(corrupt)?;
            let action: HistoryAction = action.parse().map_err(corrupt)?;

            records.push(HistoryRecord {
                counter_id: id.clone(),
                action,
                timestamp,
            });
        }

        tracing::debug!(counter_id = %id, count = records.len(), "Loaded history records");
        Ok(records)
    }

    async fn append(&self, record: &HistoryRecord, entry_id: Uuid) -> StoreResult<()> {
        self.session
            .query_unpaged(
                "INSERT INTO counter_history (counter_id, timestamp, entry_id, action) VALUES (?, ?, ?, ?)",
                (record.counter_id.as_str(), record.timestamp, entry_id, record.action.as_str()),
            )
            .await
            .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for ScyllaHistoryStore {
    async fn get_all(&self, id: &CounterId, limit: Option<usize>) -> StoreResult<Vec<HistoryRecord>> {
        // CQL rejects LIMIT 0
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        retry_on_transient(&self.retry, |_attempt| self.fetch(id, limit))
            .await
            .into_result()
    }

    async fn save(&self, record: &HistoryRecord) -> StoreResult<()> {
        // Same entry id on every attempt so a retried insert overwrites rather than duplicates
        let entry_id = next_entry_id();

        retry_on_transient(&self.retry, |_attempt| self.append(record, entry_id))
            .await
            .into_result()?;

        tracing::debug!(
            counter_id = %record.counter_id,
            action = %record.action,
            "Appended history record"
        );
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
