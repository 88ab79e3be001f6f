pub mod keyed_lock;
pub mod retry;

pub use keyed_lock::KeyedLocks;
pub use retry::{retry_on_transient, RetryConfig, RetryResult, IsTransient};
