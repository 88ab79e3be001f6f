// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - counter/  the counter aggregate and the saga that persists it
// - history/  read access to the durable audit trail
//
// This layer talks to storage only through the ports in `persistence`.
//
// ============================================================================

pub mod counter;
pub mod history;
