// Batch dispatcher: single-flight de-duplication + windowed batching
//
// Requests for the same cache key share one in-flight remote call. Distinct
// keys of the same group (e.g. same target language) arriving within the
// collection window are sent together, at most `max_batch_size` per call.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::errors::{RemoteResult, ServiceError, ServiceResult};
use crate::services::cache::CacheKey;
use crate::utils::Metrics;

/// Remote operation the dispatcher batches calls to.
///
/// `call` must return exactly one output per item, in item order.
#[async_trait]
pub trait BatchBackend: Send + Sync + 'static {
    type Item: Send + 'static;
    type Output: Clone + Send + 'static;
    /// Parameters shared by every item of one outbound call
    type Group: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    async fn call(&self, group: &Self::Group, items: Vec<Self::Item>) -> RemoteResult<Vec<Self::Output>>;
}

/// Batching limits
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_batch_size: usize,
    /// Zero means "flush on the next scheduler turn"
    pub window: Duration,
}

impl DispatchConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_batch_size: config.max_batch_size(),
            window: config.batch_window(),
        }
    }

    /// One item per call, sent immediately; single-flight still applies
    pub fn unbatched() -> Self {
        Self {
            max_batch_size: 1,
            window: Duration::ZERO,
        }
    }
}

type Waiter<T> = oneshot::Sender<ServiceResult<T>>;

/// Callers waiting on the in-flight call for one key
struct PendingRequest<T> {
    waiters: Vec<Waiter<T>>,
}

struct Queued<I> {
    key: CacheKey,
    item: I,
}

struct DispatchState<B: BatchBackend> {
    in_flight: HashMap<CacheKey, PendingRequest<B::Output>>,
    /// A group has an entry here exactly while its flush timer is scheduled
    queues: HashMap<B::Group, Vec<Queued<B::Item>>>,
}

struct DispatchInner<B: BatchBackend> {
    backend: Arc<B>,
    config: DispatchConfig,
    state: Mutex<DispatchState<B>>,
    metrics: Option<Metrics>,
}

pub struct BatchDispatcher<B: BatchBackend> {
    inner: Arc<DispatchInner<B>>,
}

impl<B: BatchBackend> Clone for BatchDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Scheduling<I> {
    None,
    Timer,
    Immediate(Vec<Queued<I>>),
    TimerAndImmediate(Vec<Queued<I>>),
}

impl<B: BatchBackend> BatchDispatcher<B> {
    pub fn new(backend: Arc<B>, config: DispatchConfig, metrics: Option<Metrics>) -> Self {
        let config = DispatchConfig {
            max_batch_size: config.max_batch_size.max(1),
            ..config
        };
        Self {
            inner: Arc::new(DispatchInner {
                backend,
                config,
                state: Mutex::new(DispatchState {
                    in_flight: HashMap::new(),
                    queues: HashMap::new(),
                }),
                metrics,
            }),
        }
    }

    /// Resolve `item` through the remote backend.
    ///
    /// If a call for `key` is already queued or in flight, the caller is
    /// attached to it instead. Dropping the returned future abandons the
    /// result but does not cancel the remote call.
    pub async fn request(&self, key: CacheKey, group: B::Group, item: B::Item) -> ServiceResult<B::Output> {
        let (tx, rx) = oneshot::channel();

        let scheduling = {
            let mut state = self.inner.state.lock();

            if let Some(pending) = state.in_flight.get_mut(&key) {
                pending.waiters.push(tx);
                if let Some(ref m) = self.inner.metrics {
                    m.record_single_flight_join();
                }
                debug!("Joined in-flight request {}", key);
                Scheduling::None
            } else {
                state
                    .in_flight
                    .insert(key.clone(), PendingRequest { waiters: vec![tx] });

                let needs_timer = !state.queues.contains_key(&group);
                let queue = state.queues.entry(group.clone()).or_default();
                queue.push(Queued { key, item });

                let full = if queue.len() >= self.inner.config.max_batch_size {
                    Some(std::mem::take(queue))
                } else {
                    None
                };

                match (needs_timer, full) {
                    (false, None) => Scheduling::None,
                    (true, None) => Scheduling::Timer,
                    (false, Some(batch)) => Scheduling::Immediate(batch),
                    (true, Some(batch)) => Scheduling::TimerAndImmediate(batch),
                }
            }
        };

        match scheduling {
            Scheduling::None => {}
            Scheduling::Timer => self.spawn_flush_timer(group),
            Scheduling::Immediate(batch) => self.spawn_dispatch(group, batch),
            Scheduling::TimerAndImmediate(batch) => {
                self.spawn_dispatch(group.clone(), batch);
                self.spawn_flush_timer(group);
            }
        }

        rx.await.unwrap_or_else(|_| {
            Err(ServiceError::RemoteCallFailed(
                "dispatcher dropped the request".to_string(),
            ))
        })
    }

    /// Number of keys currently queued or awaiting a remote result
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    fn spawn_flush_timer(&self, group: B::Group) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if inner.config.window.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(inner.config.window).await;
            }

            let queued = inner.state.lock().queues.remove(&group).unwrap_or_default();
            if queued.is_empty() {
                return;
            }

            let max = inner.config.max_batch_size;
            let mut queued = queued.into_iter().peekable();
            while queued.peek().is_some() {
                let batch: Vec<_> = queued.by_ref().take(max).collect();
                tokio::spawn(Arc::clone(&inner).dispatch(group.clone(), batch));
            }
        });
    }

    fn spawn_dispatch(&self, group: B::Group, batch: Vec<Queued<B::Item>>) {
        tokio::spawn(Arc::clone(&self.inner).dispatch(group, batch));
    }
}

impl<B: BatchBackend> DispatchInner<B> {
    async fn dispatch(self: Arc<Self>, group: B::Group, batch: Vec<Queued<B::Item>>) {
        let (keys, items): (Vec<CacheKey>, Vec<B::Item>) =
            batch.into_iter().map(|q| (q.key, q.item)).unzip();
        let count = keys.len();

        debug!("Dispatching batch of {} items for {:?}", count, group);
        if let Some(ref m) = self.metrics {
            m.record_batch_dispatched(count);
        }

        let start = Instant::now();
        let result = AssertUnwindSafe(self.backend.call(&group, items))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(outputs)) if outputs.len() == count => Ok(outputs),
            Ok(Ok(outputs)) => Err(ServiceError::RemoteCallFailed(format!(
                "expected {} results, remote returned {}",
                count,
                outputs.len()
            ))),
            Ok(Err(e)) => Err(ServiceError::from(e)),
            Err(_) => Err(ServiceError::RemoteCallFailed(
                "remote call panicked".to_string(),
            )),
        };

        if let Some(ref m) = self.metrics {
            m.record_remote_call(outcome.is_ok(), start.elapsed());
        }

        let mut delivered = Vec::with_capacity(count);
        {
            let mut state = self.state.lock();
            for key in &keys {
                if let Some(pending) = state.in_flight.remove(key) {
                    delivered.push(pending.waiters);
                } else {
                    delivered.push(Vec::new());
                }
            }
        }

        match outcome {
            Ok(outputs) => {
                for (waiters, output) in delivered.into_iter().zip(outputs) {
                    for waiter in waiters {
                        // Receiver gone means the caller abandoned the request
                        let _ = waiter.send(Ok(output.clone()));
                    }
                }
            }
            Err(err) => {
                warn!("Batch of {} items for {:?} failed: {}", count, group, err);
                for waiter in delivered.into_iter().flatten() {
                    let _ = waiter.send(Err(err.clone()));
                }
            }
        }
    }
}
