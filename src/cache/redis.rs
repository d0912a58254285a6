use anyhow::Context;
use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::{Cache, CacheError, CacheStats};

/// Redis-backed cache shared between service instances
///
/// Values are stored as raw bytes under `{prefix}:{key}`; TTLs map to `SET EX`.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    /// Key prefix for namespace isolation, including the trailing colon
    prefix: String,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl RedisCache {
    /// Connect with a default timeout of 3 seconds
    ///
    /// # Example
    /// ```no_run
    /// use lighter_data::cache::RedisCache;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let cache = RedisCache::new("redis://localhost:6379", "lighter-data").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(url: &str, prefix: &str) -> anyhow::Result<Self> {
        Self::with_timeout(url, prefix, Duration::from_secs(3)).await
    }

    pub async fn with_timeout(
        url: &str,
        prefix: &str,
        connection_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::open(url).context("Failed to create Redis client")?;

        let conn_manager = timeout(connection_timeout, ConnectionManager::new(client))
            .await
            .context(format!(
                "Redis connection timeout after {:?}. Check Redis is running at: {}",
                connection_timeout, url
            ))?
            .context("Failed to create Redis connection manager")?;

        Ok(Self {
            conn_manager,
            prefix: format!("{}:", prefix),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
        })
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn connection(&self) -> ConnectionManager {
        self.conn_manager.clone()
    }

    async fn prefixed_keys(&self) -> anyhow::Result<Vec<String>> {
        let mut conn = self.connection();
        let pattern = format!("{}*", self.prefix);
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .context("Failed to list keys from Redis")?;
        Ok(keys)
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .field("evictions", &self.evictions)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[tracing::instrument(skip(self), fields(cache_key = %key))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection();

        let data: Option<Vec<u8>> = conn
            .get(self.build_key(key))
            .await
            .context("Failed to get value from Redis")?;

        match data {
            Some(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit");
                Ok(Some(bytes))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache miss");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, value), fields(cache_key = %key, ttl = ?ttl))]
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        let full_key = self.build_key(key);
        let mut conn = self.connection();

        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(&full_key, value, ttl.as_secs().max(1))
                    .await
                    .context("Failed to set value in Redis")?;
            }
            None => {
                let _: () = conn
                    .set(&full_key, value)
                    .await
                    .context("Failed to set value in Redis")?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(cache_key = %key))]
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection();

        let deleted: u64 = conn
            .del(self.build_key(key))
            .await
            .context("Failed to delete value from Redis")?;

        self.evictions.fetch_add(deleted, Ordering::Relaxed);

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(cache_key = %key))]
    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection();

        let exists: bool = conn
            .exists(self.build_key(key))
            .await
            .context("Failed to check if key exists in Redis")?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), CacheError> {
        let keys = self.prefixed_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection();
        let deleted: u64 = conn
            .del(&keys)
            .await
            .context("Failed to clear keys from Redis")?;

        self.evictions.fetch_add(deleted, Ordering::Relaxed);
        tracing::info!(cleared_entries = deleted, "Cache cleared");

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let size = self.prefixed_keys().await?.len();

        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            hit_rate: 0.0,
        };

        stats.calculate_hit_rate();

        Ok(stats)
    }
}
