//! Cache handle shared by a coordinator and every transaction scope derived from it
//!
//! The [`Cache`] trait stores raw bytes so it stays object-safe and can be held
//! as `Arc<dyn Cache>`. Typed values cross the boundary through an explicit
//! [`Codec`], usually via [`TypedCache`].
//!
//! A missing key is never an error: every backend answers `Ok(None)` for it.

mod local;
mod null;
#[cfg(feature = "redis-cache")]
mod redis;

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CacheBackend, CacheConfig};

pub use local::LocalCache;
pub use null::NullCache;
#[cfg(feature = "redis-cache")]
pub use self::redis::RedisCache;

/// Cache failures
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend could not be constructed
    #[error("Cache initialization failed: {0}")]
    Init(String),

    #[error("Failed to encode cached value: {0}")]
    Encode(String),

    #[error("Failed to decode cached value: {0}")]
    Decode(String),

    #[error("Cache backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Byte-oriented key/value store with optional per-entry TTL
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Get the bytes stored under `key`
    ///
    /// Returns None if the key doesn't exist or has expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, expiring after `ttl` when given
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete a key from the cache
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete several keys
    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Check if a live entry exists for `key`
    async fn has(&self, key: &str) -> Result<bool, CacheError>;

    /// Clear all keys from the cache
    async fn clear(&self) -> Result<(), CacheError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Build the cache handle selected by `config`
pub async fn from_config(config: &CacheConfig) -> Result<Arc<dyn Cache>, CacheError> {
    let cache: Arc<dyn Cache> = match config.backend {
        CacheBackend::Local => Arc::new(LocalCache::with_config(config.max_entries, config.shards)?),
        CacheBackend::None => Arc::new(NullCache::new()),
        #[cfg(feature = "redis-cache")]
        CacheBackend::Redis => Arc::new(
            RedisCache::new(&config.redis_url, &config.prefix)
                .await
                .map_err(|e| CacheError::Init(format!("{:#}", e)))?,
        ),
        #[cfg(not(feature = "redis-cache"))]
        CacheBackend::Redis => {
            return Err(CacheError::Init(
                "redis backend requires the `redis-cache` feature".to_string(),
            ));
        }
    };

    tracing::info!(backend = ?config.backend, "Cache handle initialized");

    Ok(cache)
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of cache hits (successful gets)
    pub hits: u64,

    /// Total number of cache misses (failed gets)
    pub misses: u64,

    /// Total number of evictions (expired or displaced entries)
    pub evictions: u64,

    /// Current number of items in the cache
    pub size: usize,

    /// Hit rate as a fraction (0.0 to 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate hit rate from hits and misses
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

/// Serialization contract between typed values and cached bytes
pub trait Codec: Send + Sync + 'static {
    fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, CacheError>;

    fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, CacheError>;
}

/// Compact binary codec
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl Codec for Bincode {
    fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, CacheError> {
        bincode::serialize(value).map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, CacheError> {
        bincode::deserialize(bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

/// JSON codec, readable by other services sharing a backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Codec for Json {
    fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}

/// Typed view over a shared cache handle
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use lighter_data::cache::{Bincode, Cache, LocalCache, TypedCache};
///
/// # async fn example() -> Result<(), lighter_data::cache::CacheError> {
/// let handle: Arc<dyn Cache> = Arc::new(LocalCache::new());
/// let cache = TypedCache::<Bincode>::new(handle);
///
/// cache.set("answer", &42u32, None).await?;
/// assert_eq!(cache.get::<u32>("answer").await?, Some(42));
/// # Ok(())
/// # }
/// ```
pub struct TypedCache<C: Codec = Bincode> {
    inner: Arc<dyn Cache>,
    codec: PhantomData<fn() -> C>,
}

impl<C: Codec> TypedCache<C> {
    pub fn new(inner: Arc<dyn Cache>) -> Self {
        Self {
            inner,
            codec: PhantomData,
        }
    }

    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>, CacheError> {
        match self.inner.get(key).await? {
            Some(bytes) => C::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub async fn set<V: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes = C::encode(value)?;
        self.inner.set(key, bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }

    pub async fn has(&self, key: &str) -> Result<bool, CacheError> {
        self.inner.has(key).await
    }

    /// The underlying byte handle
    pub fn handle(&self) -> &Arc<dyn Cache> {
        &self.inner
    }
}

impl<C: Codec> Clone for TypedCache<C> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.inner))
    }
}

impl<C: Codec> Debug for TypedCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("inner", &self.inner)
            .field("codec", &std::any::type_name::<C>())
            .finish()
    }
}

/// Builder for consistent cache key naming
pub struct CacheKey;

impl CacheKey {
    /// Key for a single row, e.g. `users:42`
    pub fn entity(table: &str, id: impl std::fmt::Display) -> String {
        format!("{}:{}", table, id)
    }

    /// Build a custom cache key with a prefix
    pub fn custom(prefix: &str, key: impl std::fmt::Display) -> String {
        format!("{}:{}", prefix, key)
    }

    /// Fixed-length key for arbitrary input such as a rendered query
    pub fn digest(prefix: &str, raw: &str) -> String {
        format!("{}:{}", prefix, crate::security::sha256_hex(raw, ""))
    }
}
