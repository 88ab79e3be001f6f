// ============================================================================
// Counter Domain - Business Logic for the Counter Aggregate
// ============================================================================
//
// This module contains ALL Counter-specific code:
// - Value objects (CounterId, HistoryAction, HistoryEntry, HistoryRecord)
// - Commands (Increment, Reset)
// - Errors (CounterError, CounterServiceError)
// - Aggregate (CounterAggregate with its bounded history window)
// - Command Handler (CounterCommandHandler, the compensating saga)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
