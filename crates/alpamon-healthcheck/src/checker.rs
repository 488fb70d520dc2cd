//! The probe call itself, abstracted away from the transport that makes it.

use std::future::Future;

/// Outcome of a single probe attempt against `/api/servers/servers/-/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Got a 200; `commissioned` is the boolean pulled from the response body.
    Ready { commissioned: bool },
    /// Non-200, a connection error, or a timeout: try again after backoff.
    NotReady,
}

/// Implemented by the transport client's startup probe call.
///
/// Kept as a trait so this crate has no dependency on `alpamon-transport`
/// and the retry loop below can be unit-tested with a fake.
pub trait StartupChecker: Send + Sync {
    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

impl<F, Fut> StartupChecker for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ProbeOutcome> + Send,
{
    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_checker_reports_outcome() {
        let checker = || async { ProbeOutcome::Ready { commissioned: true } };
        assert_eq!(checker.probe().await, ProbeOutcome::Ready { commissioned: true });
    }
}
