//! Pooled, retried and transactional database access
//!
//! [`Coordinator`] is the entry point. It owns a [`ConnectionPool`], a shared
//! [`RetryPolicy`](crate::resilience::RetryPolicy) and a shared cache handle,
//! and scopes units of work inside transactions with guaranteed rollback on
//! error, panic or cancellation.

mod coordinator;
mod error;
mod pool;
mod transaction;

pub use coordinator::Coordinator;
pub use error::{ConnectionError, DataError, MigrationError, TransactionError};
pub use pool::{ConnectionPool, PoolLease, PoolStats};
pub use transaction::{ScopeInfo, TransactionState};
