// Unit tests for cache backends and typed access
// Tests LocalCache, NullCache, TypedCache codecs and backend selection

use lighter_data::cache::{self, Bincode, Cache, CacheKey, Json, LocalCache, NullCache, TypedCache};
use lighter_data::config::{CacheBackend, CacheConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ComplexData {
    id: u64,
    name: String,
    email: String,
    roles: Vec<String>,
    metadata: HashMap<String, String>,
}

fn complex() -> ComplexData {
    let mut metadata = HashMap::new();
    metadata.insert("team".to_string(), "platform".to_string());

    ComplexData {
        id: 7,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        roles: vec!["admin".to_string(), "ops".to_string()],
        metadata,
    }
}

// ============================================================================
// LocalCache Tests
// ============================================================================

#[tokio::test]
async fn test_local_cache_missing_key_is_not_an_error() {
    let cache = LocalCache::new();

    assert_eq!(cache.get("absent").await.unwrap(), None);
    assert!(!cache.has("absent").await.unwrap());
    cache.delete("absent").await.unwrap();
}

#[tokio::test]
async fn test_local_cache_ttl_expiry() {
    let cache = LocalCache::new();

    cache
        .set("short", b"v".to_vec(), Some(Duration::from_millis(20)))
        .await
        .unwrap();
    cache.set("forever", b"v".to_vec(), None).await.unwrap();
    assert!(cache.has("short").await.unwrap());

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.get("short").await.unwrap(), None);
    assert!(cache.has("forever").await.unwrap());
}

#[tokio::test]
async fn test_local_cache_capacity_bound() {
    let cache = LocalCache::with_config(3, 2).unwrap();

    for i in 0..10 {
        cache.set(&format!("key:{}", i), vec![i as u8], None).await.unwrap();
    }

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.size, 3);
    assert_eq!(stats.evictions, 7);
    assert!(cache.has("key:9").await.unwrap());
}

#[tokio::test]
async fn test_local_cache_rejects_bad_shards() {
    assert!(LocalCache::with_config(10, 3).is_err());
    assert!(LocalCache::with_config(0, 0).is_err());
    assert!(LocalCache::with_config(10, 0).is_ok());
}

#[tokio::test]
async fn test_local_cache_delete_many_and_clear() {
    let cache = LocalCache::new();
    for key in ["a", "b", "c"] {
        cache.set(key, key.as_bytes().to_vec(), None).await.unwrap();
    }

    cache
        .delete_many(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert!(!cache.has("a").await.unwrap());
    assert!(cache.has("c").await.unwrap());

    cache.clear().await.unwrap();
    assert_eq!(cache.stats().await.unwrap().size, 0);
}

#[tokio::test]
async fn test_local_cache_hit_rate() {
    let cache = LocalCache::new();
    cache.set("k", b"v".to_vec(), None).await.unwrap();

    cache.get("k").await.unwrap();
    cache.get("k").await.unwrap();
    cache.get("k").await.unwrap();
    cache.get("missing").await.unwrap();

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_local_cache_concurrent_access() {
    let cache: Arc<dyn Cache> = Arc::new(LocalCache::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let key = CacheKey::entity("rows", i);
                cache.set(&key, vec![i as u8], None).await.unwrap();
                cache.get(&key).await.unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(vec![i as u8]));
    }
}

// ============================================================================
// NullCache Tests
// ============================================================================

#[tokio::test]
async fn test_null_cache_stores_nothing() {
    let cache = NullCache::new();
    cache.set("k", b"v".to_vec(), None).await.unwrap();

    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(!cache.has("k").await.unwrap());
}

// ============================================================================
// TypedCache Tests
// ============================================================================

#[tokio::test]
async fn test_typed_cache_bincode_complex_value() {
    let cache: TypedCache<Bincode> = TypedCache::new(Arc::new(LocalCache::new()));
    let value = complex();

    cache.set("user:7", &value, Some(Duration::from_secs(60))).await.unwrap();
    assert_eq!(cache.get::<ComplexData>("user:7").await.unwrap(), Some(value));
}

#[tokio::test]
async fn test_typed_cache_json_is_readable_bytes() {
    let handle: Arc<dyn Cache> = Arc::new(LocalCache::new());
    let cache: TypedCache<Json> = TypedCache::new(Arc::clone(&handle));

    cache.set("greeting", &"hello", None).await.unwrap();

    let raw = handle.get("greeting").await.unwrap().unwrap();
    assert_eq!(raw, br#""hello""#.to_vec());
}

#[tokio::test]
async fn test_typed_cache_decode_mismatch_is_an_error() {
    let handle: Arc<dyn Cache> = Arc::new(LocalCache::new());
    handle.set("garbage", vec![0xff], None).await.unwrap();

    let cache: TypedCache<Json> = TypedCache::new(handle);
    assert!(cache.get::<ComplexData>("garbage").await.is_err());
}

// ============================================================================
// Backend selection
// ============================================================================

#[tokio::test]
async fn test_from_config_local_and_none() {
    let local = cache::from_config(&CacheConfig::default()).await.unwrap();
    local.set("k", b"v".to_vec(), None).await.unwrap();
    assert!(local.has("k").await.unwrap());

    let none = cache::from_config(&CacheConfig {
        backend: CacheBackend::None,
        ..CacheConfig::default()
    })
    .await
    .unwrap();
    none.set("k", b"v".to_vec(), None).await.unwrap();
    assert!(!none.has("k").await.unwrap());
}

#[cfg(not(feature = "redis-cache"))]
#[tokio::test]
async fn test_from_config_redis_without_feature_fails() {
    let result = cache::from_config(&CacheConfig {
        backend: CacheBackend::Redis,
        ..CacheConfig::default()
    })
    .await;

    assert!(matches!(result, Err(cache::CacheError::Init(_))));
}
