//! Query result cache
//!
//! The builder's `get()` consults an optional cache store when a TTL has
//! been set on the query: compute once per key per TTL, return the cached
//! rows thereafter. The default key is a blake3 digest of the compiled SQL
//! plus the JSON-serialized bindings.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::backends::DatabaseValue;
use crate::error::{ModelError, ModelResult};

/// Cache directive attached to a query
#[derive(Debug, Clone)]
pub struct CacheDirective {
    pub ttl: Duration,
    pub key: Option<String>,
}

/// Storage contract for cached query results
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> ModelResult<Option<JsonValue>>;
    async fn put(&self, key: &str, value: JsonValue, ttl: Duration) -> ModelResult<()>;
    async fn forget(&self, key: &str) -> ModelResult<bool>;
}

/// Derive a cache key from compiled SQL and its bindings
pub fn derive_cache_key(sql: &str, bindings: &[DatabaseValue]) -> String {
    let serialized = serde_json::to_string(
        &bindings.iter().map(DatabaseValue::to_json).collect::<Vec<_>>(),
    )
    .unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(sql.as_bytes());
    hasher.update(serialized.as_bytes());
    format!("query:{}", hasher.finalize().to_hex())
}

/// Compute-once-per-key-per-TTL contract over any store
pub async fn remember<F, Fut>(
    store: &dyn CacheStore,
    key: &str,
    ttl: Duration,
    compute: F,
) -> ModelResult<JsonValue>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ModelResult<JsonValue>>,
{
    if let Some(cached) = store.get(key).await? {
        return Ok(cached);
    }
    let value = compute().await?;
    store.put(key, value.clone(), ttl).await?;
    Ok(value)
}

/// In-memory cache store with TTL expiry
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (JsonValue, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> ModelResult<Option<JsonValue>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ModelError::Cache("cache mutex poisoned".to_string()))?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: JsonValue, ttl: Duration) -> ModelResult<()> {
        self.entries
            .lock()
            .map_err(|_| ModelError::Cache("cache mutex poisoned".to_string()))?
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn forget(&self, key: &str) -> ModelResult<bool> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| ModelError::Cache("cache mutex poisoned".to_string()))?
            .remove(key)
            .is_some())
    }
}
