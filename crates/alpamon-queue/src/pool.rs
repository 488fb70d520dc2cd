//! The reporter pool (component C): a fixed pool of workers that
//! drain the priority queue against an authenticated transport.

use crate::queue::PriorityQueue;
use crate::request::QueuedRequest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Outcome classification of a single delivery attempt ("2xx ->
/// success++; otherwise failure++").
pub enum Delivery {
    Success,
    Failure,
}

/// The transport a reporter worker calls to actually deliver a request.
///
/// Implemented by `alpamon-transport`'s authenticated HTTP client; kept as
/// a trait here so the queue crate has no dependency on the transport
/// crate (which itself may enqueue acks/fins back onto this queue).
#[async_trait]
pub trait RequestSink: Send + Sync {
    async fn deliver(&self, request: &QueuedRequest) -> Delivery;
}

/// Per-worker counters exposed for the `debug` internal command.
#[derive(Default)]
pub struct ReporterCounters {
    pub success: AtomicU64,
    pub failure: AtomicU64,
    pub ignored: AtomicU64,
    delay_millis: RwLock<f64>,
    latency_millis: RwLock<f64>,
}

impl ReporterCounters {
    async fn record_delay(&self, sample: Duration) {
        let mut delay = self.delay_millis.write().await;
        *delay = 0.9 * *delay + 0.1 * sample.as_secs_f64() * 1000.0;
    }

    async fn record_latency(&self, sample: Duration) {
        let mut latency = self.latency_millis.write().await;
        *latency = 0.9 * *latency + 0.1 * sample.as_secs_f64() * 1000.0;
    }

    pub async fn delay_millis(&self) -> f64 {
        *self.delay_millis.read().await
    }

    pub async fn latency_millis(&self) -> f64 {
        *self.latency_millis.read().await
    }
}

/// A fixed pool of `N` workers draining a shared [`PriorityQueue`].
pub struct ReporterPool {
    queue: PriorityQueue,
    sink: Arc<dyn RequestSink>,
    counters: Arc<ReporterCounters>,
}

impl ReporterPool {
    pub fn new(queue: PriorityQueue, sink: Arc<dyn RequestSink>) -> Self {
        Self {
            queue,
            sink,
            counters: Arc::new(ReporterCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<ReporterCounters> {
        Arc::clone(&self.counters)
    }

    /// Spawns `worker_count` tasks, each running [`ReporterPool::run_worker`]
    /// forever. Returns their join handles so the supervisor can await a
    /// clean shutdown.
    pub fn spawn(self: &Arc<Self>, worker_count: usize) -> Vec<tokio::task::JoinHandle<()>> {
        (0..worker_count)
            .map(|id| {
                let pool = Arc::clone(self);
                tokio::spawn(async move { pool.run_worker(id).await })
            })
            .collect()
    }

    async fn run_worker(&self, #[allow(unused_variables)] worker_id: usize) {
        loop {
            let request = self.queue.dequeue().await;
            self.handle_one(request).await;
        }
    }

    /// Processes exactly one dequeued request; split out from
    /// [`ReporterPool::run_worker`] so tests can drive a single step
    /// without running the worker loop forever.
    pub async fn handle_one(&self, request: QueuedRequest) {
        let now = Instant::now();

        if request.is_expired(now) {
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "metrics")]
            counter!("alpamon_reporter_ignored_total").increment(1);
            return;
        }

        if !request.is_due(now) {
            // not yet due: re-enqueue unchanged and yield one second
            self.queue.enqueue(request).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            return;
        }

        self.counters.record_delay(now.saturating_duration_since(request.due)).await;

        let start = Instant::now();
        let outcome = self.sink.deliver(&request).await;
        let end = Instant::now();
        self.counters.record_latency(end.saturating_duration_since(start)).await;

        match outcome {
            Delivery::Success => {
                self.counters.success.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                counter!("alpamon_reporter_success_total").increment(1);
            }
            Delivery::Failure => match request.retry_after_failure(end) {
                Some(retried) => {
                    self.counters.failure.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    counter!("alpamon_reporter_failures_total").increment(1);
                    self.queue.enqueue(retried).await;
                }
                None => {
                    self.counters.failure.fetch_add(1, Ordering::Relaxed);
                    self.counters.ignored.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "metrics")]
                    {
                        counter!("alpamon_reporter_failures_total").increment(1);
                        counter!("alpamon_reporter_ignored_total").increment(1);
                    }
                }
            },
        }
    }
}
