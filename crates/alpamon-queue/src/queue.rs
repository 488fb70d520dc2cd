//! The bounded priority queue (component B).

use crate::request::QueuedRequest;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[cfg(feature = "metrics")]
use metrics::gauge;

/// Default bound on pending entries (`QUEUE_CAPACITY = 36_000`).
pub const QUEUE_CAPACITY: usize = 36_000;

struct Inner {
    heap: Mutex<BinaryHeap<Reverse<QueuedRequest>>>,
    notify: Notify,
    capacity: usize,
    ignored: std::sync::atomic::AtomicU64,
}

/// A bounded min-heap of pending outbound requests, shared between every
/// producer (D, E, G, H, A-callers) and the reporter pool's workers.
///
/// Cloning is cheap: it shares the same underlying heap via `Arc`.
#[derive(Clone)]
pub struct PriorityQueue {
    inner: Arc<Inner>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                heap: Mutex::new(BinaryHeap::new()),
                notify: Notify::new(),
                capacity,
                ignored: std::sync::atomic::AtomicU64::new(0),
            }),
        }
    }

    /// Enqueues a request. On a full queue this increments the ignored
    /// counter and returns `false` without blocking, failing closed rather
    /// than growing unbounded.
    pub async fn enqueue(&self, request: QueuedRequest) -> bool {
        let mut heap = self.inner.heap.lock().await;
        if heap.len() >= self.inner.capacity {
            self.inner.ignored.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::warn!(capacity = self.inner.capacity, "queue full, dropping request");
            return false;
        }
        heap.push(Reverse(request));
        #[cfg(feature = "metrics")]
        gauge!("alpamon_queue_depth").set(heap.len() as f64);
        drop(heap);
        self.inner.notify.notify_one();
        true
    }

    /// Blocks until at least one entry is present, then pops the
    /// smallest-(priority, due) entry. Does not itself check the entry's
    /// due time or expiry — callers (the reporter pool) re-enqueue
    /// not-yet-due entries themselves; the queue itself never re-orders
    /// by due time independently of priority.
    pub async fn dequeue(&self) -> QueuedRequest {
        loop {
            {
                let mut heap = self.inner.heap.lock().await;
                if let Some(Reverse(request)) = heap.pop() {
                    #[cfg(feature = "metrics")]
                    gauge!("alpamon_queue_depth").set(heap.len() as f64);
                    return request;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn ignored_count(&self) -> u64 {
        self.inner.ignored.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.inner.heap.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether the queue is at capacity - the `debug` verb's queue-full flag.
    pub async fn is_full(&self) -> bool {
        self.inner.heap.lock().await.len() >= self.inner.capacity
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{priority, Method};

    #[tokio::test]
    async fn dequeues_lowest_priority_first() {
        let queue = PriorityQueue::new();
        queue
            .enqueue(QueuedRequest::new(priority::LOG, Method::Post, "/log", serde_json::json!({})))
            .await;
        queue
            .enqueue(QueuedRequest::new(priority::COMMAND, Method::Post, "/cmd", serde_json::json!({})))
            .await;
        queue
            .enqueue(QueuedRequest::new(priority::INVENTORY, Method::Put, "/inv", serde_json::json!({})))
            .await;

        assert_eq!(queue.dequeue().await.path, "/cmd");
        assert_eq!(queue.dequeue().await.path, "/inv");
        assert_eq!(queue.dequeue().await.path, "/log");
    }

    #[tokio::test]
    async fn full_queue_increments_ignored_and_does_not_block() {
        let queue = PriorityQueue::with_capacity(1);
        assert!(!queue.is_full().await);
        assert!(
            queue
                .enqueue(QueuedRequest::new(priority::LOG, Method::Post, "/a", serde_json::json!({})))
                .await
        );
        assert!(queue.is_full().await);
        assert!(
            !queue
                .enqueue(QueuedRequest::new(priority::LOG, Method::Post, "/b", serde_json::json!({})))
                .await
        );
        assert_eq!(queue.ignored_count(), 1);
    }

    #[tokio::test]
    async fn dequeue_blocks_until_an_entry_arrives() {
        let queue = PriorityQueue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };
        tokio::task::yield_now().await;
        queue
            .enqueue(QueuedRequest::new(priority::COMMAND, Method::Post, "/a", serde_json::json!({})))
            .await;
        let request = consumer.await.unwrap();
        assert_eq!(request.path, "/a");
    }
}
