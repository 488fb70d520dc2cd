//! Automatic reconnection for the control-channel backhaul connection.
//!
//! The backhaul session is a single long-lived `tokio-tungstenite`
//! connection (component D); when it drops, the supervisor's control
//! channel climbs a backoff curve rather than hammering the control
//! plane, and resets to the base delay once a session has processed at
//! least one message. This crate holds just the two pieces
//! `alpamon-transport::ControlChannelClient` actually needs for that:
//! the backoff curve (`ReconnectPolicy`) and the state it backs
//! (`ReconnectState`); the supervisor's own startup probe against
//! `/api/servers/servers/-/` runs a separate, shorter-lived backoff
//! directly off `alpamon-retry` (see `alpamon-healthcheck`) rather than
//! through this crate, since it never needs connection-state tracking.
//!
//! # Example
//!
//! ```rust
//! use alpamon_reconnect::{ReconnectPolicy, ReconnectState};
//! use std::time::Duration;
//!
//! let policy = ReconnectPolicy::exponential(Duration::from_secs(5), Duration::from_secs(60));
//! let state = ReconnectState::new();
//!
//! state.mark_reconnecting();
//! let delay = policy.delay_for_attempt(state.increment_attempts() as usize - 1);
//! assert_eq!(delay, Some(Duration::from_secs(5)));
//! ```

mod policy;
mod state;

pub use policy::ReconnectPolicy;
pub use state::{ConnectionState, ReconnectState};

// Re-export backoff strategies from retry crate for convenience
pub use alpamon_retry::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction,
};
