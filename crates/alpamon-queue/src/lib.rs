//! The priority request queue and reporter pool (components B and C).
//!
//! Every outbound HTTP call the agent makes — command results, inventory
//! commits, log batches, acks — goes through a single bounded priority
//! queue instead of being sent directly. A fixed pool of workers drains it
//! against an authenticated transport, retrying failed deliveries with
//! exponential backoff and dropping entries whose retry budget or expiry
//! has run out.
//!
//! ```rust
//! use alpamon_queue::{priority, Method, PriorityQueue, QueuedRequest};
//!
//! # async fn example() {
//! let queue = PriorityQueue::new();
//! let request = QueuedRequest::new(priority::COMMAND, Method::Post, "/api/commands/1/", serde_json::json!({"result": "ok"}));
//! queue.enqueue(request).await;
//! let next = queue.dequeue().await;
//! assert_eq!(next.path, "/api/commands/1/");
//! # }
//! ```

mod pool;
mod queue;
mod request;

pub use pool::{Delivery, ReporterCounters, ReporterPool, RequestSink};
pub use queue::{PriorityQueue, QUEUE_CAPACITY};
pub use request::{priority, Method, QueuedRequest, RETRY_LIMIT};
