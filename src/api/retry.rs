//! Retry and timeout policy for coordination service requests.

use std::time::Duration;

/// Controls how long the client keeps retrying a request.
///
/// Every request is bounded by `request_timeout`; retryable failures are
/// retried with exponential backoff until `deadline` has elapsed since the
/// first attempt, at which point the client gives up with
/// [`ApiError::RetryTimeout`](super::ApiError::RetryTimeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum time for a single HTTP request.
    /// Default: 15 seconds
    pub request_timeout: Duration,

    /// Total time budget for all attempts of one logical request.
    /// Default: 60 seconds
    pub deadline: Duration,

    /// Wait before the first retry.
    /// Default: 500 milliseconds
    pub initial_backoff: Duration,

    /// Upper bound for the wait between retries.
    /// Default: 8 seconds
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            deadline: Duration::from_secs(60),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Creates a new RetryPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the overall retry deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Sets the maximum wait between retries.
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Backoff to wait after the given zero-based failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}
