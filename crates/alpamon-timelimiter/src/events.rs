//! Events emitted by the time limiter.

use alpamon_core::AgentEvent;
use std::time::{Duration, Instant};

/// Observability events for a single timed call.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// The call completed within the deadline.
    Success {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The call returned an error before the deadline.
    Error {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    /// The deadline elapsed before the call completed.
    Timeout {
        pattern_name: String,
        timestamp: Instant,
        timeout_duration: Duration,
    },
}

impl AgentEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Success { .. } => "success",
            TimeLimiterEvent::Error { .. } => "error",
            TimeLimiterEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Success { timestamp, .. }
            | TimeLimiterEvent::Error { timestamp, .. }
            | TimeLimiterEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TimeLimiterEvent::Success { pattern_name, .. }
            | TimeLimiterEvent::Error { pattern_name, .. }
            | TimeLimiterEvent::Timeout { pattern_name, .. } => pattern_name,
        }
    }
}
