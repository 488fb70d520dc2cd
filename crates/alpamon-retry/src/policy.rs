//! Which errors are worth retrying.

use std::sync::Arc;

/// Decides whether a given error should trigger another attempt.
#[derive(Clone)]
pub struct RetryPolicy<E> {
    predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

/// A predicate function over the service's error type.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

impl<E> RetryPolicy<E> {
    /// Retries on every error.
    pub fn always() -> Self {
        Self {
            predicate: Arc::new(|_| true),
        }
    }

    /// Builds a policy from a predicate function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(f),
        }
    }

    /// Returns `true` if `error` should be retried.
    pub fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::always()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_retries() {
        let policy: RetryPolicy<&str> = RetryPolicy::always();
        assert!(policy.should_retry(&"anything"));
    }

    #[test]
    fn from_fn_filters_by_predicate() {
        let policy = RetryPolicy::from_fn(|status: &u16| *status >= 500);
        assert!(policy.should_retry(&503));
        assert!(!policy.should_retry(&400));
    }
}
