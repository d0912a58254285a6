//! Data-access coordinator
//!
//! A [`Coordinator`] bundles the connection pool, the shared retry policy, the
//! shared cache handle and an execution context. Root coordinators run
//! statements on pooled connections; [`Coordinator::with_transaction`] hands
//! the unit of work a scoped copy whose statements run inside the transaction.
//! Every copy derived from one root shares the same pool, policy and cache.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{
    ConnectionTrait, DbBackend, DbErr, EntityTrait, ExecResult, QueryResult, Schema, Statement,
};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::pool::{ConnectionPool, PoolStats};
use super::transaction::{ScopeInfo, TransactionScope, TransactionState};
use super::{ConnectionError, DataError, MigrationError, TransactionError};
use crate::cache::{self, Bincode, Cache, Codec, LocalCache, NullCache, TypedCache};
use crate::config::{AppConfig, DatabaseConfig, Validate};
use crate::context::ExecutionContext;
use crate::metrics::{self, TransactionOutcome};
use crate::resilience::{RetryError, RetryPolicy};

#[derive(Clone)]
enum Handle {
    Pool,
    Transaction(Arc<TransactionScope>),
}

/// Entry point for pooled, retried and transactional data access
#[derive(Clone)]
pub struct Coordinator {
    handle: Handle,
    pool: Arc<ConnectionPool>,
    cache: Arc<dyn Cache>,
    retry: Arc<RetryPolicy>,
    caching_enabled: bool,
    cache_ttl: Duration,
    ctx: ExecutionContext,
}

impl Coordinator {
    /// Open the pool described by `config` without pinging it
    ///
    /// Uses a local cache when `enable_caching` is set and a no-op cache
    /// otherwise. Call [`open`](Self::open) before relying on the pool.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DataError> {
        let cache: Arc<dyn Cache> = if config.enable_caching {
            Arc::new(LocalCache::new())
        } else {
            Arc::new(NullCache::new())
        };
        Self::build(ExecutionContext::background(), config, cache).await
    }

    /// Open the pool and ping it under `ctx`
    pub async fn new_with_context(ctx: ExecutionContext, config: &DatabaseConfig) -> Result<Self, DataError> {
        let coordinator = Self::new(config).await?.with_context(ctx);
        coordinator.open().await?;
        Ok(coordinator)
    }

    /// Build from the full application configuration, selecting the cache backend
    pub async fn from_app_config(ctx: ExecutionContext, config: &AppConfig) -> Result<Self, DataError> {
        let cache = if config.database.enable_caching {
            cache::from_config(&config.cache).await.map_err(|e| {
                tracing::error!(error = %e, "Failed to initialize cache");
                e
            })?
        } else {
            Arc::new(NullCache::new())
        };
        Self::with_cache(ctx, &config.database, cache).await
    }

    /// Open and ping the pool, sharing an existing cache handle
    pub async fn with_cache(
        ctx: ExecutionContext,
        config: &DatabaseConfig,
        cache: Arc<dyn Cache>,
    ) -> Result<Self, DataError> {
        let coordinator = Self::build(ctx, config, cache).await?;
        coordinator.open().await?;
        Ok(coordinator)
    }

    async fn build(ctx: ExecutionContext, config: &DatabaseConfig, cache: Arc<dyn Cache>) -> Result<Self, DataError> {
        config.validate()?;
        let pool = ConnectionPool::open(config).await?;

        Ok(Self {
            handle: Handle::Pool,
            pool: Arc::new(pool),
            cache,
            retry: Arc::new(RetryPolicy::from_config(config)),
            caching_enabled: config.enable_caching,
            cache_ttl: config.cache_ttl(),
            ctx,
        })
    }

    /// The same coordinator bound to another execution context
    pub fn with_context(&self, ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            ..self.clone()
        }
    }

    /// Ping the pool under this coordinator's context
    #[tracing::instrument(skip(self), fields(scope = ?self.scope()))]
    pub async fn open(&self) -> Result<(), ConnectionError> {
        self.pool.ping(&self.ctx).await?;
        tracing::info!("Database connection verified");
        Ok(())
    }

    /// Close the shared pool; fails inside a transaction scope
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) -> Result<(), ConnectionError> {
        if let Handle::Transaction(_) = self.handle {
            return Err(ConnectionError::InTransaction);
        }
        self.pool.close().await
    }

    /// Run `f` inside a transaction and commit or roll back depending on its outcome
    ///
    /// `f` receives a coordinator scoped to the new transaction and bound to
    /// `ctx`. Called on a scoped coordinator this opens a savepoint.
    ///
    /// * `Ok` from `f` commits; a failed commit is reported as
    ///   [`TransactionError::Commit`].
    /// * `Err` from `f` rolls back and returns that error unchanged.
    /// * A panic in `f` rolls back, then surfaces as [`TransactionError::Aborted`].
    /// * Cancellation or deadline expiry of `ctx` drops the unit of work, rolls
    ///   back, and surfaces as [`TransactionError::Cancelled`] or
    ///   [`TransactionError::DeadlineExceeded`].
    #[tracing::instrument(skip(self, ctx, f), fields(parent = ?self.scope()))]
    pub async fn with_transaction<F, Fut, T, E>(&self, ctx: &ExecutionContext, f: F) -> Result<T, E>
    where
        F: FnOnce(Coordinator) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<TransactionError> + Display,
    {
        let scope = match self.begin_scope(ctx).await {
            Ok(scope) => scope,
            Err(e) => {
                tracing::error!(error = %e, "Failed to begin transaction");
                metrics::record_transaction(TransactionOutcome::BeginFailed);
                return Err(e.into());
            }
        };
        let scope_id = scope.info().id;
        let scoped = self.scoped(Arc::clone(&scope), ctx.clone());

        let unit = AssertUnwindSafe(async move { f(scoped).await }).catch_unwind();

        match ctx.run(unit).await {
            Ok(Ok(Ok(value))) => {
                if let Err(reason) = ctx.check() {
                    tracing::warn!(scope_id, %reason, "Context finished before commit");
                    self.finish_rollback(&scope).await;
                    metrics::record_transaction(TransactionOutcome::Cancelled);
                    return Err(TransactionError::from(reason).into());
                }

                match scope.commit().await {
                    Ok(()) => {
                        metrics::record_transaction(TransactionOutcome::Committed);
                        Ok(value)
                    }
                    Err(e) => {
                        tracing::error!(scope_id, error = %e, "Failed to commit transaction");
                        metrics::record_transaction(TransactionOutcome::CommitFailed);
                        Err(e.into())
                    }
                }
            }
            Ok(Ok(Err(err))) => {
                tracing::warn!(scope_id, error = %err, "Unit of work failed, rolling back");
                self.finish_rollback(&scope).await;
                metrics::record_transaction(TransactionOutcome::RolledBack);
                Err(err)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(scope_id, panic = %message, "Unit of work panicked, rolling back");
                self.finish_rollback(&scope).await;
                metrics::record_transaction(TransactionOutcome::Aborted);
                Err(TransactionError::Aborted { message }.into())
            }
            Err(reason) => {
                tracing::warn!(scope_id, %reason, "Unit of work interrupted, rolling back");
                self.finish_rollback(&scope).await;
                metrics::record_transaction(TransactionOutcome::Cancelled);
                Err(TransactionError::from(reason).into())
            }
        }
    }

    async fn begin_scope(&self, ctx: &ExecutionContext) -> Result<Arc<TransactionScope>, TransactionError> {
        match &self.handle {
            Handle::Pool => TransactionScope::begin(&self.pool, ctx).await,
            Handle::Transaction(parent) => parent.begin_nested(ctx).await,
        }
    }

    // Rollback failures are logged only; the caller sees the failure that caused the rollback.
    async fn finish_rollback(&self, scope: &TransactionScope) {
        if let Err(e) = scope.rollback().await {
            tracing::error!(scope_id = scope.info().id, error = %e, "Failed to roll back transaction");
        }
    }

    fn scoped(&self, scope: Arc<TransactionScope>, ctx: ExecutionContext) -> Self {
        Self {
            handle: Handle::Transaction(scope),
            pool: Arc::clone(&self.pool),
            cache: Arc::clone(&self.cache),
            retry: Arc::clone(&self.retry),
            caching_enabled: self.caching_enabled,
            cache_ttl: self.cache_ttl,
            ctx,
        }
    }

    /// Run `op` under the shared retry policy, stopping early if the context finishes
    pub async fn retry<F, Fut, T, E>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.retry.execute_with(&self.ctx, op).await
    }

    /// Return the cached value for `key`, or load, cache and return it
    ///
    /// With caching disabled this is just `loader()`. Cache faults are logged
    /// and treated as misses; loader failures are never cached.
    pub async fn read_through<T, F, Fut, E>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.caching_enabled {
            return loader().await;
        }

        let cache = self.typed_cache::<Bincode>();
        match cache.get::<T>(key).await {
            Ok(Some(value)) => {
                tracing::debug!(key, "Cache hit");
                return Ok(value);
            }
            Ok(None) => tracing::debug!(key, "Cache miss"),
            Err(e) => tracing::warn!(key, error = %e, "Cache read failed, loading from store"),
        }

        let value = loader().await?;
        if let Err(e) = cache.set(key, &value, Some(self.cache_ttl)).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    /// The shared cache handle viewed through codec `C`
    pub fn typed_cache<C: Codec>(&self) -> TypedCache<C> {
        TypedCache::new(Arc::clone(&self.cache))
    }

    /// Apply `statements` in order
    ///
    /// On a root coordinator they run in one transaction of their own; on a
    /// scoped coordinator they join the current transaction.
    #[tracing::instrument(skip(self, statements), fields(count = statements.len()))]
    pub async fn migrate(&self, statements: &[TableCreateStatement]) -> Result<(), MigrationError> {
        match self.handle {
            Handle::Pool => {
                let ctx = self.ctx.clone();
                self.with_transaction(&ctx, |scoped| async move { scoped.apply(statements).await })
                    .await
            }
            Handle::Transaction(_) => self.apply(statements).await,
        }
    }

    async fn apply(&self, statements: &[TableCreateStatement]) -> Result<(), MigrationError> {
        let backend = self.get_database_backend();
        for (index, statement) in statements.iter().enumerate() {
            self.execute(backend.build(statement))
                .await
                .map_err(|source| MigrationError::Apply { index, source })?;
        }
        tracing::info!(count = statements.len(), "Schema statements applied");
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` for `entity` in this coordinator's dialect
    pub fn schema_for<E: EntityTrait>(&self, entity: E) -> TableCreateStatement {
        let mut statement = Schema::new(self.get_database_backend()).create_table_from_entity(entity);
        statement.if_not_exists();
        statement
    }

    /// Apply every pending migration of `M`
    #[tracing::instrument(skip(self))]
    pub async fn run_migrator<M: MigratorTrait>(&self) -> Result<(), MigrationError> {
        match &self.handle {
            Handle::Pool => {
                let conn = self.pool.connection()?;
                M::up(&conn, None).await.map_err(MigrationError::Migrator)
            }
            Handle::Transaction(scope) => {
                let guard = scope.handle().await;
                let tx = guard.as_ref().ok_or(TransactionError::NotOpen)?;
                M::up(tx, None).await.map_err(MigrationError::Migrator)
            }
        }
    }

    pub fn set_limits(&self, max_open: u32, max_idle: u32) -> PoolStats {
        self.pool.set_limits(max_open, max_idle)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// `Idle` for root coordinators, otherwise the state of this scope's transaction
    pub fn transaction_state(&self) -> TransactionState {
        match &self.handle {
            Handle::Pool => TransactionState::Idle,
            Handle::Transaction(scope) => scope.state(),
        }
    }

    pub fn scope(&self) -> Option<ScopeInfo> {
        match &self.handle {
            Handle::Pool => None,
            Handle::Transaction(scope) => Some(scope.info()),
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self.handle, Handle::Transaction(_))
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn caching_enabled(&self) -> bool {
        self.caching_enabled
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn retry_policy(&self) -> &Arc<RetryPolicy> {
        &self.retry
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn not_open() -> DbErr {
    DbErr::Custom(TransactionError::NotOpen.to_string())
}

/// Runs `$call` against the connection behind `$self`, racing its context
macro_rules! dispatch {
    ($self:ident, $conn:ident => $call:expr) => {
        match &$self.handle {
            Handle::Pool => {
                let lease = $self.pool.acquire(&$self.ctx).await?;
                let $conn = lease.connection();
                $self.ctx.run($call).await.map_err(ConnectionError::from)?
            }
            Handle::Transaction(scope) => {
                let guard = scope.handle().await;
                let $conn = guard.as_ref().ok_or_else(not_open)?;
                $self.ctx.run($call).await.map_err(ConnectionError::from)?
            }
        }
    };
}

#[async_trait::async_trait]
impl ConnectionTrait for Coordinator {
    fn get_database_backend(&self) -> DbBackend {
        self.pool.backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        dispatch!(self, conn => conn.execute(stmt))
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        dispatch!(self, conn => conn.execute_unprepared(sql))
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        dispatch!(self, conn => conn.query_one(stmt))
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        dispatch!(self, conn => conn.query_all(stmt))
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("scope", &self.scope())
            .field("state", &self.transaction_state())
            .field("pool", &self.pool)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("caching_enabled", &self.caching_enabled)
            .finish()
    }
}
