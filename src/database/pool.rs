//! Connection pool manager
//!
//! Wraps the ORM's driver pool with a semaphore gate. The driver pool is opened
//! at `max_pool_ceiling` and the gate alone enforces `max_open`. Every leased
//! connection holds one permit, so [`ConnectionPool::set_limits`] takes effect
//! for the very next acquisition without touching connections that are already
//! checked out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::ConnectionError;
use crate::config::{DatabaseConfig, DatabaseDriver};
use crate::context::ExecutionContext;
use crate::{metrics, network};

/// Snapshot of pool limits and usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_open: u32,
    pub max_idle: u32,
    pub in_use: u32,
    pub available: u32,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy)]
struct PoolLimits {
    max_open: u32,
    max_idle: u32,
}

/// Pooled connections behind an acquisition gate
pub struct ConnectionPool {
    conn: RwLock<Option<DatabaseConnection>>,
    gate: Arc<Semaphore>,
    limits: Mutex<PoolLimits>,
    closed: AtomicBool,
    backend: DbBackend,
    acquire_timeout: Duration,
    /// `max_connections` of the driver pool
    ceiling: u32,
}

/// A checked-out connection; the permit returns to the gate on drop
pub struct PoolLease {
    conn: DatabaseConnection,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<ConnectionPool>,
}

impl PoolLease {
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

impl Drop for PoolLease {
    fn drop(&mut self) {
        drop(self.permit.take());
        metrics::set_pool_in_use(self.pool.in_use() as usize);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionPool {
    /// Open the driver pool described by `config`
    ///
    /// When `connect_wait` is set the server address is dialled until it
    /// accepts TCP connections first. The pool is not known to be usable until
    /// [`ping`](Self::ping) succeeds.
    #[tracing::instrument(skip(config), fields(driver = ?config.driver, host = %config.host, database = %config.name))]
    pub async fn open(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        if let (DatabaseDriver::Postgres, Some(wait)) = (config.driver, config.connect_wait()) {
            network::dial_until_reachable(&config.address(), wait).await?;
        }

        let ceiling = config.max_pool_ceiling.max(1);
        let max_open = config.max_open_conns.clamp(1, ceiling);
        let max_idle = config.max_idle_conns.min(max_open);

        let mut options = ConnectOptions::new(config.url());
        options
            .max_connections(ceiling)
            .min_connections(max_idle)
            .connect_timeout(config.connect_timeout())
            .acquire_timeout(config.acquire_timeout())
            .sqlx_logging(false);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            user = %config.user,
            max_open,
            max_idle,
            ceiling,
            "Opening database connection pool"
        );

        metrics::describe_metrics();

        let conn = Database::connect(options).await.map_err(|e| {
            tracing::error!(dsn = %config.redacted_dsn(), error = %e, "Failed to open database connection");
            ConnectionError::Open(e)
        })?;
        let backend = conn.get_database_backend();

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            gate: Arc::new(Semaphore::new(max_open as usize)),
            limits: Mutex::new(PoolLimits { max_open, max_idle }),
            closed: AtomicBool::new(false),
            backend,
            acquire_timeout: config.acquire_timeout(),
            ceiling,
        })
    }

    pub fn backend(&self) -> DbBackend {
        self.backend
    }

    /// Highest `max_open` that [`set_limits`](Self::set_limits) accepts
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The driver handle, failing once the pool is closed
    pub fn connection(&self) -> Result<DatabaseConnection, ConnectionError> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ConnectionError::Closed)
    }

    /// Check out a connection, waiting at most `acquire_timeout` for a permit
    pub async fn acquire(self: &Arc<Self>, ctx: &ExecutionContext) -> Result<PoolLease, ConnectionError> {
        let conn = self.connection()?;

        let wait = tokio::time::timeout(self.acquire_timeout, Arc::clone(&self.gate).acquire_owned());
        let permit = match ctx.run(wait).await? {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ConnectionError::Closed),
            Err(_) => {
                tracing::warn!(timeout = ?self.acquire_timeout, "Timed out waiting for a pooled connection");
                return Err(ConnectionError::AcquireTimeout(self.acquire_timeout));
            }
        };

        metrics::set_pool_in_use(self.in_use() as usize);

        Ok(PoolLease {
            conn,
            permit: Some(permit),
            pool: Arc::clone(self),
        })
    }

    /// Verify the store answers on a pooled connection
    pub async fn ping(self: &Arc<Self>, ctx: &ExecutionContext) -> Result<(), ConnectionError> {
        let lease = self.acquire(ctx).await?;
        ctx.run(lease.connection().ping()).await?.map_err(|e| {
            tracing::error!(error = %e, "Database ping failed");
            ConnectionError::Ping(e)
        })
    }

    /// Change the gate size for subsequent acquisitions
    ///
    /// Raising stops at the driver ceiling. Lowering never goes below the
    /// number of connections checked out right now. In both cases the effective
    /// limit is clamped and reported in the returned stats. `max_idle` is
    /// clamped to the effective `max_open`; the driver only applies it as its
    /// idle floor when the pool is opened.
    pub fn set_limits(&self, max_open: u32, max_idle: u32) -> PoolStats {
        {
            let mut limits = lock(&self.limits);
            let requested = max_open.clamp(1, self.ceiling);
            if requested < max_open {
                tracing::warn!(max_open, ceiling = self.ceiling, "max_open clamped to the driver pool ceiling");
            }

            if requested > limits.max_open {
                self.gate.add_permits((requested - limits.max_open) as usize);
                limits.max_open = requested;
            } else if requested < limits.max_open {
                let wanted = (limits.max_open - requested) as usize;
                let forgotten = self.gate.forget_permits(wanted);
                limits.max_open -= forgotten as u32;
                if forgotten < wanted {
                    tracing::warn!(
                        requested,
                        effective = limits.max_open,
                        "max_open clamped to connections currently in use"
                    );
                }
            }

            limits.max_idle = max_idle.min(limits.max_open);
            tracing::info!(max_open = limits.max_open, max_idle = limits.max_idle, "Pool limits updated");
        }

        self.stats()
    }

    pub fn stats(&self) -> PoolStats {
        let limits = *lock(&self.limits);
        let available = (self.gate.available_permits() as u32).min(limits.max_open);

        PoolStats {
            max_open: limits.max_open,
            max_idle: limits.max_idle,
            in_use: limits.max_open - available,
            available,
            closed: self.is_closed(),
        }
    }

    fn in_use(&self) -> u32 {
        self.stats().in_use
    }

    /// Stop handing out connections and release the driver pool
    ///
    /// Waits for connections still checked out to be returned. Every later
    /// operation, a second `close` included, fails with [`ConnectionError::Closed`].
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) -> Result<(), ConnectionError> {
        let conn = self
            .conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ConnectionError::Closed)?;

        self.closed.store(true, Ordering::Release);
        self.gate.close();

        conn.close().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to close database connection pool");
            ConnectionError::Close(e)
        })?;

        tracing::info!("Database connection pool closed");
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("backend", &self.backend)
            .field("stats", &self.stats())
            .finish()
    }
}
