use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::errors::CounterError;

// ============================================================================
// Counter Value Objects
// ============================================================================

/// Upper bound of a counter value (inclusive)
pub const MAX_VALUE: u32 = 100;

/// Number of recent history entries kept inside the aggregate
pub const HISTORY_CAPACITY: usize = 10;

/// Key of the counter served by the default deployment
pub const DEFAULT_COUNTER_ID: &str = "globalId";

/// Opaque key identifying a counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterId(String);

impl CounterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CounterId {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTER_ID)
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CounterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Action recorded in a counter's audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Initial,
    Increment,
    Reset,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Initial => "INITIAL",
            HistoryAction::Increment => "INCREMENT",
            HistoryAction::Reset => "RESET",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = CounterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIAL" => Ok(HistoryAction::Initial),
            "INCREMENT" => Ok(HistoryAction::Increment),
            "RESET" => Ok(HistoryAction::Reset),
            other => Err(CounterError::UnknownAction(other.to_string())),
        }
    }
}

/// One action applied to a counter, stamped at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(action: HistoryAction, timestamp: DateTime<Utc>) -> Self {
        Self { action, timestamp }
    }

    pub fn now(action: HistoryAction) -> Self {
        Self::new(action, Utc::now())
    }
}

/// Durable form of a history entry, tagged with its owning counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub counter_id: CounterId,
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(counter_id: CounterId, entry: &HistoryEntry) -> Self {
        Self {
            counter_id,
            action: entry.action,
            timestamp: entry.timestamp,
        }
    }

    pub fn entry(&self) -> HistoryEntry {
        HistoryEntry::new(self.action, self.timestamp)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
