use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use super::{Cache, CacheError, CacheStats};

/// A no-op cache used when caching is disabled
///
/// Every read is a miss and every write is discarded, so callers can keep a
/// single code path whether or not a real backend is configured.
///
/// # Example
/// ```no_run
/// use lighter_data::cache::{Cache, NullCache};
///
/// # async fn example() -> Result<(), lighter_data::cache::CacheError> {
/// let cache = NullCache::new();
///
/// cache.set("key", b"value".to_vec(), None).await?;
/// assert_eq!(cache.get("key").await?, None);
/// assert!(!cache.has("key").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        NullCache
    }
}

impl fmt::Display for NullCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NullCache")
    }
}

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn has(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats::new())
    }
}
