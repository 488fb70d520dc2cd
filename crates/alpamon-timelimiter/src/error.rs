//! Error type for the time limiter.

use std::fmt;

/// Either the wrapped call exceeded its deadline, or it ran to completion
/// and returned an error of its own.
#[derive(Debug)]
pub enum TimeLimiterError<E> {
    /// The deadline elapsed before the inner call completed.
    Timeout,
    /// The inner call returned an error before the deadline.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for TimeLimiterError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeLimiterError::Timeout => write!(f, "deadline exceeded"),
            TimeLimiterError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeLimiterError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimeLimiterError::Timeout => None,
            TimeLimiterError::Inner(e) => Some(e),
        }
    }
}

impl<E> TimeLimiterError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimiterError::Timeout)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            TimeLimiterError::Timeout => None,
            TimeLimiterError::Inner(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_variant_reports_no_inner_error() {
        let err: TimeLimiterError<&str> = TimeLimiterError::Timeout;
        assert!(err.is_timeout());
        assert_eq!(err.into_inner(), None);
    }

    #[test]
    fn inner_variant_carries_the_error_through() {
        let err = TimeLimiterError::Inner("connection reset");
        assert!(!err.is_timeout());
        assert_eq!(err.into_inner(), Some("connection reset"));
    }
}
