use std::collections::HashMap;
use std::time::{Duration, Instant};

use aicache_core::{namespaced_key, AiCacheError, KvStore};
use async_trait::async_trait;
use tokio::sync::RwLock;

struct CacheEntry {
    value: String,
    created_at: Instant,
}

/// In-process key-value store with optional TTL expiration.
///
/// Used when no external store is configured, and as the exact-match tier in
/// tests and demos.
pub struct InMemoryKvStore {
    prefix: String,
    store: RwLock<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl InMemoryKvStore {
    /// Create a store with the given key prefix and no TTL.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            store: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Expire entries after the given duration.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Whether a raw, already namespaced key is present. Test helper.
    pub async fn contains_raw(&self, raw_key: &str) -> bool {
        self.store.read().await.contains_key(raw_key)
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new("ai-cache")
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    fn key_prefix(&self) -> &str {
        &self.prefix
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AiCacheError> {
        let store = self.store.read().await;
        match store.get(&namespaced_key(&self.prefix, key)) {
            Some(entry) => {
                if let Some(ttl) = self.ttl {
                    if entry.created_at.elapsed() > ttl {
                        return Ok(None);
                    }
                }
                Ok(Some(entry.value.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AiCacheError> {
        let mut store = self.store.write().await;
        store.insert(
            namespaced_key(&self.prefix, key),
            CacheEntry {
                value: value.to_string(),
                created_at: Instant::now(),
            },
        );
        Ok(())
    }
}
