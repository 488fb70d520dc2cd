//! Retry budgets, so a struggling backhaul connection doesn't turn one
//! slow endpoint into an unbounded storm of retries.
//!
//! The priority queue tracks a per-request countdown ("remaining retry
//! budget (initial 5)", ) directly on the queued item itself; this
//! module is the process-wide variant shared across every call through a
//! given [`crate::RetryLayer`], for callers that want a ceiling on total
//! retries rather than per-item ones.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A budget that controls how many retries are allowed.
///
/// Budgets are shared across all clones of a service, providing
/// a global ceiling on retries regardless of how many requests are
/// in flight concurrently.
pub trait RetryBudget: Send + Sync {
    /// Attempt to withdraw one retry token from the budget.
    ///
    /// Returns `true` if the retry is allowed, `false` if the budget is exhausted.
    fn try_withdraw(&self) -> bool;

    /// Deposit one token after a successful request, replenishing the budget.
    fn deposit(&self);

    /// Current budget balance, for observability.
    fn balance(&self) -> usize;
}

/// A countdown budget: starts at `capacity`, decremented by `try_withdraw`,
/// replenished by `deposit` up to `capacity`.
pub struct CountdownBudget {
    remaining: AtomicUsize,
    capacity: usize,
}

impl CountdownBudget {
    pub fn new(capacity: usize) -> Arc<dyn RetryBudget> {
        Arc::new(Self {
            remaining: AtomicUsize::new(capacity),
            capacity,
        })
    }
}

impl RetryBudget for CountdownBudget {
    fn try_withdraw(&self) -> bool {
        loop {
            let current = self.remaining.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .remaining
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn deposit(&self) {
        let _ = self
            .remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                (current < self.capacity).then_some(current + 1)
            });
    }

    fn balance(&self) -> usize {
        self.remaining.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdraws_until_exhausted() {
        let budget = CountdownBudget::new(5);
        for _ in 0..5 {
            assert!(budget.try_withdraw());
        }
        assert!(!budget.try_withdraw());
    }

    #[test]
    fn deposit_replenishes_up_to_capacity() {
        let budget = CountdownBudget::new(2);
        assert!(budget.try_withdraw());
        assert!(budget.try_withdraw());
        assert!(!budget.try_withdraw());

        budget.deposit();
        assert_eq!(budget.balance(), 1);
        assert!(budget.try_withdraw());

        for _ in 0..10 {
            budget.deposit();
        }
        assert_eq!(budget.balance(), 2);
    }
}
