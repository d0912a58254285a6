use serde::{Deserialize, Serialize};

use super::{ConfigError, Validate, WithDefaults};

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process sharded map
    Local,
    /// Redis (requires the `redis-cache` feature)
    Redis,
    /// No caching
    None,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend used when caching is enabled
    #[serde(default = "default_backend")]
    pub backend: CacheBackend,
    /// Maximum entries held by the local cache
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Shard count for the local cache (0 = CPU count * 4)
    #[serde(default)]
    pub shards: usize,
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Key prefix for namespace isolation
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_backend() -> CacheBackend {
    CacheBackend::Local
}

fn default_max_entries() -> usize {
    1000
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_prefix() -> String {
    "lighter-data".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_entries: default_max_entries(),
            shards: 0,
            redis_url: default_redis_url(),
            prefix: default_prefix(),
        }
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == CacheBackend::Local && self.max_entries == 0 {
            return Err(ConfigError::ValidationError("cache.max_entries must be > 0 for the local backend".to_string()));
        }
        if self.backend == CacheBackend::Redis && self.redis_url.is_empty() {
            return Err(ConfigError::ValidationError("cache.redis_url cannot be empty for the redis backend".to_string()));
        }
        Ok(())
    }
}

impl WithDefaults for CacheConfig {
    fn with_defaults() -> Self {
        Self::default()
    }
}
