//! The supervisor's startup probe (component I).
//!
//! Before the agent does anything else it has to know the control plane is
//! reachable and whether this host is commissioned yet. This crate is the
//! "probe `/api/servers/servers/-/` with bounded exponential backoff (5s ->
//! 60s) until 200" loop, with the actual HTTP call left to a caller-supplied
//! [`StartupChecker`] so this crate doesn't depend on `alpamon-transport`.
//!
//! ```rust
//! use alpamon_healthcheck::{await_commissioned, ProbeOutcome};
//!
//! # async fn example() {
//! let mut attempts = 0;
//! let commissioned = await_commissioned(|| {
//!     attempts += 1;
//!     async move { ProbeOutcome::Ready { commissioned: true } }
//! })
//! .await;
//! assert!(commissioned);
//! # }
//! ```

mod checker;

pub use checker::{ProbeOutcome, StartupChecker};

use alpamon_retry::{ExponentialBackoff, IntervalFunction};
use std::time::Duration;

/// Base and cap of the startup probe's backoff ("5 s -> 60 s").
const BASE_DELAY: Duration = Duration::from_secs(5);
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Probes until the control plane answers 200, returning the `commissioned`
/// flag from that response. Never gives up: a control plane that never
/// comes up keeps the agent retrying forever rather than giving up.
pub async fn await_commissioned<C: StartupChecker>(checker: C) -> bool {
    let backoff = ExponentialBackoff::new(BASE_DELAY).max_interval(MAX_DELAY);
    let mut attempt = 0usize;
    loop {
        match checker.probe().await {
            ProbeOutcome::Ready { commissioned } => return commissioned,
            ProbeOutcome::NotReady => {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempt, "startup probe not ready, backing off");
                tokio::time::sleep(backoff.next_interval(attempt)).await;
                attempt += 1;
            }
        }
    }
}
