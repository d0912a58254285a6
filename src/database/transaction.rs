//! Transaction scope state
//!
//! A scope owns exactly one ORM transaction (a savepoint when nested) plus, for
//! root scopes, the pool lease it runs on. The transaction handle sits behind an
//! async mutex so a scoped coordinator shared between tasks still issues one
//! statement at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::Serialize;

use super::pool::{ConnectionPool, PoolLease};
use super::TransactionError;
use crate::context::ExecutionContext;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a transaction scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// No transaction begun (root coordinators)
    Idle,
    Open,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
}

impl TransactionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TransactionState::Committed | TransactionState::RolledBack)
    }
}

/// Identity of a scope; depth 0 is a root transaction, deeper levels are savepoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeInfo {
    pub id: u64,
    pub depth: u32,
}

pub(crate) struct TransactionScope {
    info: ScopeInfo,
    tx: tokio::sync::Mutex<Option<DatabaseTransaction>>,
    state: Mutex<TransactionState>,
    lease: Mutex<Option<PoolLease>>,
}

pub(crate) type TransactionGuard<'a> = tokio::sync::MutexGuard<'a, Option<DatabaseTransaction>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TransactionScope {
    fn new(tx: DatabaseTransaction, depth: u32, lease: Option<PoolLease>) -> Arc<Self> {
        Arc::new(Self {
            info: ScopeInfo {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                depth,
            },
            tx: tokio::sync::Mutex::new(Some(tx)),
            state: Mutex::new(TransactionState::Open),
            lease: Mutex::new(lease),
        })
    }

    /// Begin a root transaction on a freshly leased connection
    pub(crate) async fn begin(
        pool: &Arc<ConnectionPool>,
        ctx: &ExecutionContext,
    ) -> Result<Arc<Self>, TransactionError> {
        let lease = pool.acquire(ctx).await?;
        let tx = ctx
            .run(lease.connection().begin())
            .await?
            .map_err(TransactionError::Begin)?;

        let scope = Self::new(tx, 0, Some(lease));
        tracing::debug!(scope_id = scope.info.id, "Transaction begun");
        Ok(scope)
    }

    /// Open a savepoint inside this scope's transaction
    pub(crate) async fn begin_nested(&self, ctx: &ExecutionContext) -> Result<Arc<Self>, TransactionError> {
        let guard = self.tx.lock().await;
        let parent = guard.as_ref().ok_or(TransactionError::NotOpen)?;
        let tx = ctx.run(parent.begin()).await?.map_err(TransactionError::Begin)?;
        drop(guard);

        let scope = Self::new(tx, self.info.depth + 1, None);
        tracing::debug!(
            scope_id = scope.info.id,
            parent_id = self.info.id,
            depth = scope.info.depth,
            "Savepoint opened"
        );
        Ok(scope)
    }

    pub(crate) fn info(&self) -> ScopeInfo {
        self.info
    }

    pub(crate) fn state(&self) -> TransactionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: TransactionState) {
        *lock(&self.state) = state;
    }

    /// Exclusive access to the live transaction; `None` once finished
    pub(crate) async fn handle(&self) -> TransactionGuard<'_> {
        self.tx.lock().await
    }

    pub(crate) async fn commit(&self) -> Result<(), TransactionError> {
        let tx = self.tx.lock().await.take().ok_or(TransactionError::NotOpen)?;
        self.set_state(TransactionState::Committing);

        let result = tx.commit().await;
        self.release();

        match result {
            Ok(()) => {
                self.set_state(TransactionState::Committed);
                tracing::debug!(scope_id = self.info.id, "Transaction committed");
                Ok(())
            }
            Err(e) => {
                // `commit` consumed the handle; its drop queued a ROLLBACK that the
                // driver runs before the connection is handed out again
                self.set_state(TransactionState::RolledBack);
                Err(TransactionError::Commit(e))
            }
        }
    }

    pub(crate) async fn rollback(&self) -> Result<(), TransactionError> {
        let tx = self.tx.lock().await.take().ok_or(TransactionError::NotOpen)?;
        self.set_state(TransactionState::RollingBack);

        let result = tx.rollback().await;
        self.release();
        self.set_state(TransactionState::RolledBack);

        match result {
            Ok(()) => {
                tracing::debug!(scope_id = self.info.id, "Transaction rolled back");
                Ok(())
            }
            Err(e) => Err(TransactionError::Rollback(e)),
        }
    }

    fn release(&self) {
        drop(lock(&self.lease).take());
    }
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("info", &self.info)
            .field("state", &self.state())
            .finish()
    }
}
