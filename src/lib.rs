// ============================================================================
// Ping Counter
// ============================================================================
//
// A bounded counter with an audit trail kept in two independent stores.
// Writes to the counter and its history are made to appear atomic through a
// compensating saga (see domain::counter::command_handler).
//
// ============================================================================

pub mod api;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod persistence;
pub mod utils;
