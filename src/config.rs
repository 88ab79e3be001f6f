use std::str::FromStr;
use std::time::Duration;

use crate::domain::counter::CounterId;
use crate::utils::RetryConfig;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read from environment variables; every key has a default so a bare
// `cargo run` serves the in-memory backend on port 3000.
//
// ============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Where counters and history are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Scylla,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "scylla" => Ok(StoreBackend::Scylla),
            _ => Err("expected `memory` or `scylla`".to_string()),
        }
    }
}

/// How concurrent sagas on the same counter id are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyMode {
    /// Sagas on one id run one at a time; no lost updates within this process
    #[default]
    PerKeyLock,
    /// No in-process locking; concurrent increments on one id may lose updates
    LastWriterWins,
}

impl FromStr for ConsistencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_key_lock" => Ok(ConsistencyMode::PerKeyLock),
            "last_writer_wins" => Ok(ConsistencyMode::LastWriterWins),
            _ => Err("expected `per_key_lock` or `last_writer_wins`".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScyllaConfig {
    pub nodes: Vec<String>,
    pub keyspace: String,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:9042".to_string()],
            keyspace: "ping_counter".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    pub counter_id: CounterId,
    pub store_backend: StoreBackend,
    pub scylla: ScyllaConfig,
    pub consistency: ConsistencyMode,
    pub store_retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            counter_id: CounterId::default(),
            store_backend: StoreBackend::default(),
            scylla: ScyllaConfig::default(),
            consistency: ConsistencyMode::default(),
            store_retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(address) = get("BIND_ADDRESS") {
            config.bind_address = address;
        }
        if let Some(port) = get("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(id) = get("COUNTER_ID") {
            config.counter_id = CounterId::new(id);
        }
        if let Some(backend) = get("STORE_BACKEND") {
            config.store_backend = parse("STORE_BACKEND", &backend)?;
        }
        if let Some(nodes) = get("SCYLLA_NODES") {
            config.scylla.nodes = nodes
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(keyspace) = get("SCYLLA_KEYSPACE") {
            // Interpolated into DDL, so identifiers only
            if !keyspace.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::invalid("SCYLLA_KEYSPACE", &keyspace, "expected [A-Za-z0-9_]+"));
            }
            config.scylla.keyspace = keyspace;
        }
        if let Some(mode) = get("CONSISTENCY_MODE") {
            config.consistency = parse("CONSISTENCY_MODE", &mode)?;
        }

        let attempts = match get("STORE_RETRY_ATTEMPTS") {
            Some(v) => parse("STORE_RETRY_ATTEMPTS", &v)?,
            None => config.store_retry.max_attempts,
        };
        let initial_delay = match get("STORE_RETRY_INITIAL_DELAY_MS") {
            Some(v) => Duration::from_millis(parse("STORE_RETRY_INITIAL_DELAY_MS", &v)?),
            None => config.store_retry.initial_delay,
        };
        config.store_retry = RetryConfig::new(attempts, initial_delay);

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, value, e.to_string()))
}
