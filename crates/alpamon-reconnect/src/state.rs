//! Connection state for the backhaul session, shared between
//! `ControlChannelClient::run`'s reconnect loop and anything that wants to
//! read `connection_state()` (the `debug` internal command, eventually).

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Where the backhaul session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A session is open and has processed at least one frame since
    /// the last reconnect (or is freshly connected).
    Connected,

    /// The session ended; the reconnect loop is about to sleep before
    /// trying again.
    Disconnected,

    /// Backoff has elapsed and a new `connect_async` call is in flight.
    Reconnecting,
}

/// Shared reconnect bookkeeping for one `ControlChannelClient`.
///
/// Cloning shares the same counters via `Arc`, so the session loop and
/// anything reading `connection_state()` observe the same state.
#[derive(Clone)]
pub struct ReconnectState {
    state: Arc<AtomicU64>,
    attempts: Arc<AtomicU32>,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU64::new(Self::encode(ConnectionState::Disconnected))),
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// The session's current state.
    pub fn state(&self) -> ConnectionState {
        Self::decode(self.state.load(Ordering::Acquire))
    }

    /// The number of reconnect attempts made since the last successful
    /// connection - the index fed to `ReconnectPolicy::delay_for_attempt`.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Increments and returns the new attempt count.
    pub fn increment_attempts(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Resets the attempt count to zero - called once a session has
    /// processed at least one frame, so a connection that stays up climbs
    /// back down to the base delay rather than staying penalized by an
    /// earlier string of failures.
    pub fn reset_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    pub fn mark_connected(&self) {
        self.set(ConnectionState::Connected);
        self.reset_attempts();
    }

    pub fn mark_disconnected(&self) {
        self.set(ConnectionState::Disconnected);
    }

    pub fn mark_reconnecting(&self) {
        self.set(ConnectionState::Reconnecting);
    }

    fn set(&self, state: ConnectionState) {
        self.state.store(Self::encode(state), Ordering::Release);
    }

    fn encode(state: ConnectionState) -> u64 {
        match state {
            ConnectionState::Connected => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::Reconnecting => 2,
        }
    }

    fn decode(encoded: u64) -> ConnectionState {
        match encoded {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Disconnected,
            _ => ConnectionState::Reconnecting,
        }
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReconnectState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectState")
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected_with_no_attempts() {
        let state = ReconnectState::new();
        assert_eq!(state.state(), ConnectionState::Disconnected);
        assert_eq!(state.attempts(), 0);
    }

    #[test]
    fn transitions_follow_the_reconnect_loop() {
        let state = ReconnectState::new();

        state.mark_reconnecting();
        assert_eq!(state.state(), ConnectionState::Reconnecting);

        state.mark_connected();
        assert_eq!(state.state(), ConnectionState::Connected);
        assert_eq!(state.attempts(), 0);

        state.mark_disconnected();
        assert_eq!(state.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn attempts_climb_until_a_connection_resets_them() {
        let state = ReconnectState::new();

        assert_eq!(state.increment_attempts(), 1);
        assert_eq!(state.increment_attempts(), 2);
        assert_eq!(state.increment_attempts(), 3);
        assert_eq!(state.attempts(), 3);

        state.mark_connected();
        assert_eq!(state.attempts(), 0);
    }
}
