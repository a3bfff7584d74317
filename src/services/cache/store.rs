use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::core::errors::{ConfigError, StoreResult};

/// Key-value mapping the TTL cache persists its entries in.
///
/// Each `set` must replace the whole value atomically; the cache relies on
/// that instead of cross-key transactions.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
    async fn list_keys(&self, prefix: Option<&str>) -> StoreResult<Vec<String>>;

    /// Read without counting as a use; backends without recency tracking
    /// can rely on the default
    async fn peek(&self, key: &str) -> StoreResult<Option<String>> {
        self.get(key).await
    }

    /// Delete `key` only while it still holds exactly `expected`.
    ///
    /// Returns whether the entry was removed. Must be atomic with respect to
    /// `set`, so a value written after `expected` was read is never lost.
    async fn delete_if(&self, key: &str, expected: &str) -> StoreResult<bool>;
}

/// In-process store with LRU eviction once `capacity` entries are held
pub struct MemoryStore {
    entries: Mutex<LruCache<String, String>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::InvalidCapacity)?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.entries.lock().put(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().pop(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: Option<&str>) -> StoreResult<Vec<String>> {
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .map(|(k, _)| k)
            .filter(|k| prefix.map_or(true, |p| k.starts_with(p)))
            .cloned()
            .collect())
    }

    async fn peek(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().peek(key).cloned())
    }

    async fn delete_if(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        if entries.peek(key).map(String::as_str) == Some(expected) {
            entries.pop(key);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
