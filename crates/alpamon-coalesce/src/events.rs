use alpamon_core::events::AgentEvent;
use std::time::Instant;

/// Events emitted by the coalescing single-flight lock - the `debug`
/// internal command and any listener wired through
/// `CoalesceConfig::builder().on_event(...)` observe the same stream the
/// `tracing`/`metrics` features would otherwise log independently.
#[derive(Debug, Clone)]
pub enum CoalesceEvent {
    /// This request became the leader and is running the underlying call.
    Leading {
        pattern_name: String,
        timestamp: Instant,
    },
    /// This request found one already in flight for its key and is
    /// waiting for that leader's result instead of running again.
    Waiting {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl AgentEvent for CoalesceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CoalesceEvent::Leading { .. } => "Leading",
            CoalesceEvent::Waiting { .. } => "Waiting",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CoalesceEvent::Leading { timestamp, .. } | CoalesceEvent::Waiting { timestamp, .. } => {
                *timestamp
            }
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CoalesceEvent::Leading { pattern_name, .. }
            | CoalesceEvent::Waiting { pattern_name, .. } => pattern_name,
        }
    }
}
