use serde::Serialize;
use chrono::Utc;
use std::collections::VecDeque;

use super::value_objects::{CounterId, HistoryAction, HistoryEntry, HISTORY_CAPACITY, MAX_VALUE};
use super::errors::CounterError;

// ============================================================================
// Counter Aggregate - Domain Logic
// ============================================================================
//
// Immutable snapshot: every transition returns a new aggregate and leaves
// the receiver untouched. Invariants:
// - 0 <= value <= MAX_VALUE
// - history.len() <= HISTORY_CAPACITY, oldest entry evicted first
// - history timestamps are non-decreasing
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterAggregate {
    id: CounterId,
    value: u32,
    history: VecDeque<HistoryEntry>,
}

impl CounterAggregate {
    /// Fresh counter at zero with a single INITIAL entry
    pub fn create_new(id: CounterId) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_CAPACITY);
        history.push_back(HistoryEntry::now(HistoryAction::Initial));

        Self { id, value: 0, history }
    }

    /// Rebuild a counter loaded from storage, rejecting snapshots that break invariants
    pub fn from_snapshot(
        id: CounterId,
        value: u32,
        history: impl IntoIterator<Item = HistoryEntry>,
    ) -> Result<Self, CounterError> {
        if value > MAX_VALUE {
            return Err(CounterError::ValueOutOfRange(value));
        }

        let history: VecDeque<HistoryEntry> = history.into_iter().collect();
        if history.len() > HISTORY_CAPACITY {
            return Err(CounterError::HistoryOverflow(history.len()));
        }

        Ok(Self { id, value, history })
    }

    pub fn id(&self) -> &CounterId {
        &self.id
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// Recent entries, oldest first
    pub fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    pub fn latest_entry(&self) -> Option<&HistoryEntry> {
        self.history.back()
    }

    pub fn can_increment(&self) -> bool {
        self.value < MAX_VALUE
    }

    pub fn increment(&self) -> Result<Self, CounterError> {
        if !self.can_increment() {
            return Err(CounterError::IncrementFailed);
        }

        Ok(self.transition(self.value + 1, HistoryAction::Increment))
    }

    /// Compensating inverse of `increment`.
    ///
    /// Never appends an entry. A trailing INCREMENT entry is withdrawn from
    /// the window so the rolled-back snapshot does not show an increment that
    /// was never recorded.
    pub fn decrement(&self) -> Result<Self, CounterError> {
        if self.value == 0 {
            return Err(CounterError::DecrementFailed);
        }

        let mut history = self.history.clone();
        if matches!(history.back(), Some(entry) if entry.action == HistoryAction::Increment) {
            history.pop_back();
        }

        Ok(Self {
            id: self.id.clone(),
            value: self.value - 1,
            history,
        })
    }

    pub fn reset(&self) -> Self {
        self.transition(0, HistoryAction::Reset)
    }

    fn transition(&self, value: u32, action: HistoryAction) -> Self {
        let entry = self.next_entry(action);

        let mut history = self.history.clone();
        if history.len() >= HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(entry);

        Self {
            id: self.id.clone(),
            value,
            history,
        }
    }

    // Clock skew must not produce an entry older than the one before it
    fn next_entry(&self, action: HistoryAction) -> HistoryEntry {
        let now = Utc::now();
        let timestamp = match self.latest_entry() {
            Some(latest) if latest.timestamp > now => latest.timestamp,
            _ => now,
        };

        HistoryEntry::new(action, timestamp)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
