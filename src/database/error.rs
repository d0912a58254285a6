use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::context::Interrupted;

/// The pool could not be opened, pinged, used or closed
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to open database connection: {0}")]
    Open(#[source] DbErr),

    #[error("Database ping failed: {0}")]
    Ping(#[source] DbErr),

    #[error("Failed to close database connection: {0}")]
    Close(#[source] DbErr),

    #[error("Connection pool is closed")]
    Closed,

    #[error("Timed out after {0:?} waiting for a pooled connection")]
    AcquireTimeout(Duration),

    #[error("Connection pool cannot be closed from inside a transaction scope")]
    InTransaction,

    #[error("{address} not reachable after {waited:?}")]
    Unreachable { address: String, waited: Duration },

    #[error("Connection attempt interrupted: {0}")]
    Interrupted(#[from] Interrupted),
}

/// Begin, commit or rollback failed, or the unit of work did not finish normally
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] DbErr),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] DbErr),

    #[error("Failed to roll back transaction: {0}")]
    Rollback(#[source] DbErr),

    /// The unit of work panicked; the transaction was rolled back first
    #[error("Transaction aborted by panic: {message}")]
    Aborted { message: String },

    #[error("Transaction cancelled")]
    Cancelled,

    #[error("Transaction deadline exceeded")]
    DeadlineExceeded,

    #[error("Transaction is no longer open")]
    NotOpen,

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl TransactionError {
    /// True for failures caused by the execution context rather than the store
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            TransactionError::Cancelled
                | TransactionError::DeadlineExceeded
                | TransactionError::Connection(ConnectionError::Interrupted(_))
        )
    }
}

impl From<Interrupted> for TransactionError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => TransactionError::Cancelled,
            Interrupted::DeadlineExceeded => TransactionError::DeadlineExceeded,
        }
    }
}

/// Schema application failed
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to apply schema statement #{index}: {source}")]
    Apply {
        index: usize,
        #[source]
        source: DbErr,
    },

    #[error("Migrator failed: {0}")]
    Migrator(#[source] DbErr),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Any failure surfaced by the data layer
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Cache initialization failed: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Query failed: {0}")]
    Query(#[from] DbErr),
}

impl From<ConnectionError> for DbErr {
    fn from(error: ConnectionError) -> Self {
        DbErr::Custom(error.to_string())
    }
}

impl From<TransactionError> for DbErr {
    fn from(error: TransactionError) -> Self {
        match error {
            TransactionError::Begin(err)
            | TransactionError::Commit(err)
            | TransactionError::Rollback(err) => err,
            other => DbErr::Custom(other.to_string()),
        }
    }
}
