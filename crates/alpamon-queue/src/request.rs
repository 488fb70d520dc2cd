//! The queued request type and its priority-queue ordering.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

/// HTTP method of a queued outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Semantic priority bands. Lower numbers are served first.
pub mod priority {
    pub const COMMAND: i32 = 10;
    pub const INVENTORY: i32 = 80;
    pub const LOG: i32 = 90;
}

/// Default retry budget handed to every freshly created request.
pub const RETRY_LIMIT: u32 = 5;

/// An outbound HTTP operation pending delivery through the reporter pool.
///
/// Ordering is total: by `priority` ascending, ties broken by `due`
/// ascending, so this type can sit directly in a
/// `BinaryHeap<Reverse<QueuedRequest>>`.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub priority: i32,
    pub method: Method,
    pub path: String,
    pub body: serde_json::Value,
    pub created_at: Instant,
    pub due: Instant,
    pub expiry: Option<Instant>,
    pub remaining_retries: u32,
}

impl QueuedRequest {
    /// Creates a request eligible for delivery immediately, with a full
    /// retry budget and no expiry.
    pub fn new(priority: i32, method: Method, path: impl Into<String>, body: serde_json::Value) -> Self {
        let now = Instant::now();
        Self {
            priority,
            method,
            path: path.into(),
            body,
            created_at: now,
            due: now,
            expiry: None,
            remaining_retries: RETRY_LIMIT,
        }
    }

    /// Sets an absolute expiry; the request is dropped if not yet delivered by then.
    pub fn with_expiry(mut self, expiry: Instant) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry.is_some_and(|expiry| now > expiry)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }

    /// Schedules the next attempt `2^(RETRY_LIMIT - remaining)` seconds out
    /// (1, 2, 4, 8, 16s) and consumes one unit of retry budget.
    /// Returns `None` once the budget is exhausted.
    pub fn retry_after_failure(mut self, now: Instant) -> Option<Self> {
        if self.remaining_retries == 0 {
            return None;
        }
        self.remaining_retries -= 1;
        let exponent = RETRY_LIMIT - self.remaining_retries;
        self.due = now + Duration::from_secs(1u64 << exponent.min(63));
        Some(self)
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.due == other.due
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.due.cmp(&other.due))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_priority_then_due() {
        let now = Instant::now();
        let mut low = QueuedRequest::new(priority::LOG, Method::Post, "/a", serde_json::json!({}));
        low.due = now;
        let mut high = QueuedRequest::new(priority::COMMAND, Method::Post, "/b", serde_json::json!({}));
        high.due = now + Duration::from_secs(100);

        // lower priority number sorts first regardless of due time
        assert!(high < low);
    }

    #[test]
    fn retry_backoff_matches_spec_sequence() {
        let now = Instant::now();
        let mut req = QueuedRequest::new(priority::COMMAND, Method::Post, "/a", serde_json::json!({}));
        let mut delays = Vec::new();
        for _ in 0..5 {
            req = req.retry_after_failure(now).expect("budget remaining");
            delays.push(req.due.duration_since(now).as_secs());
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
        assert_eq!(req.remaining_retries, 0);
        assert!(req.retry_after_failure(now).is_none());
    }

    #[test]
    fn expiry_is_exclusive_of_now() {
        let now = Instant::now();
        let req = QueuedRequest::new(priority::LOG, Method::Post, "/a", serde_json::json!({}))
            .with_expiry(now);
        assert!(!req.is_expired(now));
        assert!(req.is_expired(now + Duration::from_nanos(1)));
    }
}
