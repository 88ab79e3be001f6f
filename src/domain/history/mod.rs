// ============================================================================
// History Domain - Read access to the durable audit trail
// ============================================================================

pub mod query_service;

pub use query_service::*;
