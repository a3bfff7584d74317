use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::clock::Clock;
use crate::core::errors::StoreResult;
use crate::services::cache::key::CacheKey;
use crate::services::cache::store::KeyValueStore;
use crate::utils::Metrics;

/// Value plus the wall-clock time it was written, stored as one JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: u64,
}

/// Expiration layer over a [`KeyValueStore`].
///
/// Entries live under `<namespace><key>`; an entry older than `ttl` is a miss
/// and is removed on read or by [`TtlCache::evict_expired`].
pub struct TtlCache<V> {
    inner: Arc<TtlInner>,
    _value: PhantomData<fn() -> V>,
}

struct TtlInner {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _value: PhantomData,
        }
    }
}

impl<V> TtlCache<V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        namespace: &str,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            inner: Arc::new(TtlInner {
                store,
                namespace: namespace.to_string(),
                ttl,
                clock,
                metrics,
            }),
            _value: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Look up a live entry; expired or unreadable entries are deleted and reported as a miss
    pub async fn get(&self, key: &CacheKey) -> StoreResult<Option<V>> {
        let storage_key = self.storage_key(key);
        let now = self.inner.clock.now_millis();

        let Some(raw) = self.inner.store.get(&storage_key).await? else {
            self.record_miss();
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry<V>>(&raw) {
            Ok(entry) if !self.inner.is_expired(entry.created_at, now) => {
                if let Some(ref m) = self.inner.metrics {
                    m.record_cache_hit();
                }
                debug!("Cache hit {}", storage_key);
                Ok(Some(entry.value))
            }
            Ok(_) => {
                debug!("Cache entry {} expired, removing", storage_key);
                // A concurrent writer may have refreshed the entry since it was read
                if self.inner.store.delete_if(&storage_key, &raw).await? {
                    if let Some(ref m) = self.inner.metrics {
                        m.record_cache_evictions(1);
                    }
                }
                self.record_miss();
                Ok(None)
            }
            Err(e) => {
                warn!("Dropping unreadable cache entry {}: {}", storage_key, e);
                self.inner.store.delete_if(&storage_key, &raw).await?;
                self.record_miss();
                Ok(None)
            }
        }
    }

    /// Store a value stamped with the current time, replacing any previous entry
    pub async fn set(&self, key: &CacheKey, value: V) -> StoreResult<()> {
        let entry = CacheEntry {
            value,
            created_at: self.inner.clock.now_millis(),
        };
        let json = serde_json::to_string(&entry)?;
        self.inner.store.set(&self.storage_key(key), json).await
    }

    /// Delete every entry of this namespace older than the TTL at `now`
    pub async fn evict_expired(&self, now: u64) -> StoreResult<usize> {
        self.inner.evict_expired(now).await
    }

    /// Run [`TtlCache::evict_expired`] every `interval` until the handle is stopped
    pub fn start_eviction(&self, interval: Duration) -> EvictionHandle {
        let inner = Arc::clone(&self.inner);
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);

        info!(
            "Starting cache eviction for '{}' every {}s (ttl {}s)",
            inner.namespace,
            interval.as_secs(),
            inner.ttl.as_secs()
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop_signal.notified() => break,
                    _ = ticker.tick() => {
                        let now = inner.clock.now_millis();
                        match inner.evict_expired(now).await {
                            Ok(0) => {}
                            Ok(removed) => debug!("Evicted {} expired entries from '{}'", removed, inner.namespace),
                            Err(e) => warn!("Cache eviction for '{}' failed: {}", inner.namespace, e),
                        }
                    }
                }
            }

            info!("Cache eviction for '{}' stopped", inner.namespace);
        });

        EvictionHandle {
            stop,
            task: Some(task),
        }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.inner.namespace, key)
    }

    fn record_miss(&self) {
        if let Some(ref m) = self.inner.metrics {
            m.record_cache_miss();
        }
    }
}

impl TtlInner {
    fn is_expired(&self, created_at: u64, now: u64) -> bool {
        now.saturating_sub(created_at) > self.ttl.as_millis() as u64
    }

    async fn evict_expired(&self, now: u64) -> StoreResult<usize> {
        let keys = self.store.list_keys(Some(&self.namespace)).await?;
        let mut removed = 0;

        for key in keys {
            // Peek so a sweep does not reorder the store's recency list
            let Some(raw) = self.store.peek(&key).await? else {
                continue;
            };

            // Only the timestamp matters here; the value type is irrelevant
            let expired = match serde_json::from_str::<CacheEntry<serde::de::IgnoredAny>>(&raw) {
                Ok(entry) => self.is_expired(entry.created_at, now),
                Err(_) => true,
            };

            if expired && self.store.delete_if(&key, &raw).await? {
                removed += 1;
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_cache_evictions(removed);
        }
        Ok(removed)
    }
}

/// Lifecycle handle of a running eviction task
pub struct EvictionHandle {
    stop: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl EvictionHandle {
    /// Stop the task and wait for it to finish its current sweep
    pub async fn stop(mut self) {
        self.stop.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for EvictionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::services::cache::key::{derive_key, KeyRequest};
    use crate::services::cache::store::MemoryStore;

    const TTL: Duration = Duration::from_secs(60);

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, TtlCache<String>) {
        let store = Arc::new(MemoryStore::new(100).unwrap());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = TtlCache::new(store.clone(), "translate_", TTL, clock.clone(), Some(Metrics::new()));
        (store, clock, cache)
    }

    fn key(text: &str) -> CacheKey {
        derive_key(&KeyRequest::new(text, "da", None))
    }

    #[tokio::test]
    async fn test_hit_just_before_ttl_and_miss_just_after() {
        let (store, clock, cache) = setup();
        cache.set(&key("hello"), "hej".to_string()).await.unwrap();

        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(cache.get(&key("hello")).await.unwrap().as_deref(), Some("hej"));

        clock.advance(Duration::from_millis(2));
        assert_eq!(cache.get(&key("hello")).await.unwrap(), None);

        // Removed lazily on read
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_entry_exactly_at_ttl_is_still_live() {
        let (_store, clock, cache) = setup();
        cache.set(&key("edge"), "kant".to_string()).await.unwrap();

        clock.advance(TTL);
        assert!(cache.get(&key("edge")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_restarts_entry_age() {
        let (_store, clock, cache) = setup();
        cache.set(&key("a"), "first".to_string()).await.unwrap();
        clock.advance(Duration::from_secs(50));
        cache.set(&key("a"), "second".to_string()).await.unwrap();
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.get(&key("a")).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_evict_expired_only_touches_own_namespace() {
        let (store, clock, cache) = setup();
        cache.set(&key("old"), "gammel".to_string()).await.unwrap();
        store.set("tts_other", "{}".to_string()).await.unwrap();

        clock.advance(Duration::from_secs(30));
        cache.set(&key("new"), "ny".to_string()).await.unwrap();
        clock.advance(Duration::from_secs(31));

        let removed = cache.evict_expired(clock.now_millis()).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert!(cache.get(&key("new")).await.unwrap().is_some());

        // Idempotent
        assert_eq!(cache.evict_expired(clock.now_millis()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_treated_as_miss() {
        let (store, _clock, cache) = setup();
        let k = key("broken");
        store.set(&format!("translate_{}", k), "not json".to_string()).await.unwrap();

        assert_eq!(cache.get(&k).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_track_hits_and_misses() {
        let store = Arc::new(MemoryStore::new(10).unwrap());
        let clock = Arc::new(ManualClock::new(0));
        let metrics = Metrics::new();
        let cache: TtlCache<String> =
            TtlCache::new(store, "t_", TTL, clock, Some(metrics.clone()));

        cache.get(&key("x")).await.unwrap();
        cache.set(&key("x"), "y".to_string()).await.unwrap();
        cache.get(&key("x")).await.unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_lru_order_of_backing_store() {
        let store = Arc::new(MemoryStore::new(3).unwrap());
        let clock = Arc::new(ManualClock::new(0));
        let cache: TtlCache<String> = TtlCache::new(store.clone(), "t_", TTL, clock.clone(), None);

        for text in ["a", "b", "c"] {
            cache.set(&key(text), text.to_uppercase()).await.unwrap();
        }
        cache.get(&key("a")).await.unwrap();

        assert_eq!(cache.evict_expired(clock.now_millis()).await.unwrap(), 0);
        cache.set(&key("d"), "D".to_string()).await.unwrap();

        assert_eq!(cache.get(&key("a")).await.unwrap().as_deref(), Some("A"));
        assert_eq!(cache.get(&key("b")).await.unwrap(), None);
    }

    /// Writes `fresh` under `key` right after the first read of it, as a
    /// concurrent `set` landing between a read and the following delete would
    struct InterleavedWriter {
        inner: Arc<MemoryStore>,
        pending: parking_lot::Mutex<Option<(String, String)>>,
    }

    impl InterleavedWriter {
        async fn after_read(&self, key: &str) {
            let write = {
                let mut pending = self.pending.lock();
                match pending.as_ref() {
                    Some((k, _)) if k == key => pending.take(),
                    _ => None,
                }
            };
            if let Some((k, v)) = write {
                self.inner.set(&k, v).await.unwrap();
            }
        }
    }

    #[async_trait::async_trait]
    impl KeyValueStore for InterleavedWriter {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            let value = self.inner.get(key).await?;
            self.after_read(key).await;
            Ok(value)
        }

        async fn set(&self, key: &str, value: String) -> StoreResult<()> {
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }

        async fn list_keys(&self, prefix: Option<&str>) -> StoreResult<Vec<String>> {
            self.inner.list_keys(prefix).await
        }

        async fn peek(&self, key: &str) -> StoreResult<Option<String>> {
            let value = self.inner.peek(key).await?;
            self.after_read(key).await;
            Ok(value)
        }

        async fn delete_if(&self, key: &str, expected: &str) -> StoreResult<bool> {
            self.inner.delete_if(key, expected).await
        }
    }

    fn interleaved(clock: &Arc<ManualClock>) -> (Arc<InterleavedWriter>, TtlCache<String>) {
        let store = Arc::new(InterleavedWriter {
            inner: Arc::new(MemoryStore::new(10).unwrap()),
            pending: parking_lot::Mutex::new(None),
        });
        let cache = TtlCache::new(store.clone(), "t_", TTL, clock.clone(), None);
        (store, cache)
    }

    fn schedule_fresh_write(store: &InterleavedWriter, clock: &ManualClock, k: &CacheKey) {
        let fresh = serde_json::to_string(&CacheEntry {
            value: "fresh".to_string(),
            created_at: clock.now_millis(),
        })
        .unwrap();
        *store.pending.lock() = Some((format!("t_{}", k), fresh));
    }

    #[tokio::test]
    async fn test_sweep_keeps_entry_refreshed_during_sweep() {
        let clock = Arc::new(ManualClock::new(0));
        let (store, cache) = interleaved(&clock);
        let k = key("racy");

        cache.set(&k, "stale".to_string()).await.unwrap();
        clock.advance(TTL * 2);
        schedule_fresh_write(&store, &clock, &k);

        assert_eq!(cache.evict_expired(clock.now_millis()).await.unwrap(), 0);
        assert_eq!(cache.get(&k).await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_lazy_expiry_keeps_entry_refreshed_during_read() {
        let clock = Arc::new(ManualClock::new(0));
        let (store, cache) = interleaved(&clock);
        let k = key("racy");

        cache.set(&k, "stale".to_string()).await.unwrap();
        clock.advance(TTL * 2);
        schedule_fresh_write(&store, &clock, &k);

        assert_eq!(cache.get(&k).await.unwrap(), None);
        assert_eq!(cache.get(&k).await.unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_eviction_task_sweeps_and_stops() {
        let (store, clock, cache) = setup();
        cache.set(&key("stale"), "x".to_string()).await.unwrap();
        clock.advance(TTL * 2);

        let handle = cache.start_eviction(Duration::from_millis(10));
        assert!(handle.is_running());

        for _ in 0..50 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.is_empty());

        handle.stop().await;
    }
}
