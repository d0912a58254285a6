use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{Cache, CacheError, CacheStats};

/// Entry capacity used by [`LocalCache::new`]
pub const DEFAULT_CAPACITY: usize = 1000;

/// Internal cache entry with optional expiration
#[derive(Debug, Clone)]
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| Instant::now() >= expires_at)
            .unwrap_or(false)
    }
}

/// Local in-memory cache using DashMap
///
/// Holds at most `capacity` entries. Inserting a new key into a full cache
/// first drops expired entries, then displaces an arbitrary live one.
#[derive(Debug)]
pub struct LocalCache {
    store: Arc<DashMap<String, CacheEntry>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: Arc<AtomicU64>,
    /// Background cleanup task handle
    cleanup_handle: Option<JoinHandle<()>>,
}

impl LocalCache {
    /// Create a LocalCache with default capacity and shard count (CPU count * 4)
    pub fn new() -> Self {
        Self::build(DEFAULT_CAPACITY, default_shards())
    }

    /// Create a LocalCache with explicit limits
    ///
    /// `shards == 0` selects the default. Any other value must be a power of two
    /// greater than one.
    pub fn with_config(capacity: usize, shards: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::Init("local cache capacity must be > 0".to_string()));
        }
        let shards = match shards {
            0 => default_shards(),
            n if n > 1 && n.is_power_of_two() => n,
            n => {
                return Err(CacheError::Init(format!(
                    "local cache shard count must be a power of two > 1, got {}",
                    n
                )));
            }
        };
        Ok(Self::build(capacity, shards))
    }

    fn build(capacity: usize, shards: usize) -> Self {
        let store = Arc::new(DashMap::with_shard_amount(shards));
        let evictions = Arc::new(AtomicU64::new(0));

        // The sweep needs a runtime; without one expired entries are still
        // dropped lazily on access.
        let cleanup_handle = tokio::runtime::Handle::try_current()
            .ok()
            .map(|runtime| Self::start_cleanup_task(&runtime, Arc::clone(&store), Arc::clone(&evictions)));

        Self {
            store,
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions,
            cleanup_handle,
        }
    }

    /// Start background cleanup task that runs every 60 seconds
    fn start_cleanup_task(
        runtime: &tokio::runtime::Handle,
        store: Arc<DashMap<String, CacheEntry>>,
        evictions: Arc<AtomicU64>,
    ) -> JoinHandle<()> {
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));

            loop {
                interval.tick().await;

                let before = store.len();
                store.retain(|_, entry| !entry.is_expired());
                let removed = before.saturating_sub(store.len());

                if removed > 0 {
                    evictions.fetch_add(removed as u64, Ordering::Relaxed);
                    tracing::debug!(removed, "Expired cache entries swept");
                }
            }
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn make_room(&self) {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let mut removed = before.saturating_sub(self.store.len());

        if self.store.len() >= self.capacity {
            let victim = self.store.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                self.store.remove(&victim);
                removed += 1;
            }
        }

        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
    }

    fn remove_expired(&self, key: &str) {
        if self.store.remove_if(key, |_, entry| entry.is_expired()).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn default_shards() -> usize {
    (num_cpus::get() * 4).next_power_of_two().max(2)
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalCache {
    fn drop(&mut self) {
        // Abort cleanup task when LocalCache is dropped
        if let Some(handle) = self.cleanup_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Cache for LocalCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let found = self.store.get(key).map(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.data.clone())
            }
        });

        match found {
            Some(Some(data)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(data))
            }
            Some(None) => {
                self.remove_expired(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        if !self.store.contains_key(key) && self.store.len() >= self.capacity {
            self.make_room();
        }

        self.store.insert(key.to_string(), CacheEntry::new(value, ttl));

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let expired = match self.store.get(key) {
            Some(entry) => entry.is_expired(),
            None => return Ok(false),
        };

        if expired {
            self.remove_expired(key);
            return Ok(false);
        }

        Ok(true)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.store.len(),
            hit_rate: 0.0,
        };

        stats.calculate_hit_rate();

        Ok(stats)
    }
}
