use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept for average/percentile; older samples are dropped
pub const MAX_LATENCY_SAMPLES: usize = 1024;

/// Metrics collector shared by the caches, the dispatcher and the façades.
///
/// Cheap to clone; every clone records into the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Remote call metrics
    remote_calls_total: AtomicUsize,
    remote_calls_success: AtomicUsize,
    remote_calls_failed: AtomicUsize,
    remote_latency_ms: RwLock<VecDeque<u64>>,

    // Dispatch metrics
    batches_dispatched: AtomicUsize,
    items_dispatched: AtomicUsize,
    single_flight_joins: AtomicUsize,

    // Cache metrics
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_evictions: AtomicUsize,

    // Per-operation request counters
    operation_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                remote_calls_total: AtomicUsize::new(0),
                remote_calls_success: AtomicUsize::new(0),
                remote_calls_failed: AtomicUsize::new(0),
                remote_latency_ms: RwLock::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES)),
                batches_dispatched: AtomicUsize::new(0),
                items_dispatched: AtomicUsize::new(0),
                single_flight_joins: AtomicUsize::new(0),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                cache_evictions: AtomicUsize::new(0),
                operation_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Remote call metrics
    pub fn record_remote_call(&self, success: bool, duration: Duration) {
        self.inner.remote_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.remote_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.remote_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        let mut latency = self.inner.remote_latency_ms.write();
        if latency.len() == MAX_LATENCY_SAMPLES {
            latency.pop_front();
        }
        latency.push_back(duration.as_millis() as u64);
    }

    // Dispatch metrics
    pub fn record_batch_dispatched(&self, num_items: usize) {
        self.inner.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        self.inner.items_dispatched.fetch_add(num_items, Ordering::Relaxed);
    }

    pub fn record_single_flight_join(&self) {
        self.inner.single_flight_joins.fetch_add(1, Ordering::Relaxed);
    }

    // Cache metrics
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_evictions(&self, count: usize) {
        self.inner.cache_evictions.fetch_add(count, Ordering::Relaxed);
    }

    // Operation metrics
    pub fn record_operation(&self, operation: &str) {
        self.inner
            .operation_counters
            .entry(operation.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency: Vec<u64> = self.inner.remote_latency_ms.read().iter().copied().collect();
        let remote_latency_avg_ms = avg(&latency);
        let remote_latency_p95_ms = percentile(&latency, 0.95);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        let operations = self
            .inner
            .operation_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            remote_calls_total: self.inner.remote_calls_total.load(Ordering::Relaxed),
            remote_calls_success: self.inner.remote_calls_success.load(Ordering::Relaxed),
            remote_calls_failed: self.inner.remote_calls_failed.load(Ordering::Relaxed),
            remote_latency_avg_ms,
            remote_latency_p95_ms,
            remote_latency_samples: latency.len(),
            batches_dispatched: self.inner.batches_dispatched.load(Ordering::Relaxed),
            items_dispatched: self.inner.items_dispatched.load(Ordering::Relaxed),
            single_flight_joins: self.inner.single_flight_joins.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            cache_evictions: self.inner.cache_evictions.load(Ordering::Relaxed),
            operations,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP remote_calls_total Total number of remote service calls
# TYPE remote_calls_total counter
remote_calls_total {{}} {}

# HELP remote_calls_failed Number of failed remote service calls
# TYPE remote_calls_failed counter
remote_calls_failed {{}} {}

# HELP remote_latency_avg_ms Average remote call latency in milliseconds
# TYPE remote_latency_avg_ms gauge
remote_latency_avg_ms {{}} {}

# HELP batches_dispatched_total Outbound batches sent
# TYPE batches_dispatched_total counter
batches_dispatched_total {{}} {}

# HELP single_flight_joins_total Requests attached to an in-flight call
# TYPE single_flight_joins_total counter
single_flight_joins_total {{}} {}

# HELP cache_hit_rate Cache hit rate (0.0 to 1.0)
# TYPE cache_hit_rate gauge
cache_hit_rate {{}} {}

# HELP cache_evictions_total Expired cache entries removed
# TYPE cache_evictions_total counter
cache_evictions_total {{}} {}
"#,
            snapshot.remote_calls_total,
            snapshot.remote_calls_failed,
            snapshot.remote_latency_avg_ms,
            snapshot.batches_dispatched,
            snapshot.single_flight_joins,
            snapshot.cache_hit_rate,
            snapshot.cache_evictions,
        );

        if !snapshot.operations.is_empty() {
            out.push_str("\n# HELP operations_total Requests per operation\n# TYPE operations_total counter\n");
            for (operation, count) in &snapshot.operations {
                out.push_str(&format!("operations_total {{operation=\"{}\"}} {}\n", operation, count));
            }
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub remote_calls_total: usize,
    pub remote_calls_success: usize,
    pub remote_calls_failed: usize,
    pub remote_latency_avg_ms: u64,
    pub remote_latency_p95_ms: u64,
    pub remote_latency_samples: usize,
    pub batches_dispatched: usize,
    pub items_dispatched: usize,
    pub single_flight_joins: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub cache_evictions: usize,
    pub operations: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
