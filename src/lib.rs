pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod resilience;
pub mod security;

// Testing utilities (always available for integration tests)
pub mod testing;

// Re-export commonly used types for convenience
pub use cache::{Cache, CacheError, CacheKey, CacheStats, LocalCache, NullCache, TypedCache};
#[cfg(feature = "redis-cache")]
pub use cache::RedisCache;
pub use context::{ExecutionContext, Interrupted};
pub use database::{
    ConnectionError, Coordinator, DataError, MigrationError, PoolStats, ScopeInfo, TransactionError,
    TransactionState,
};
pub use resilience::{RetryError, RetryPolicy};
pub use security::SecretString;
