//! Retry policy for failed resource verification.
//!
//! A resource whose validator rejects it is retried up to a bounded number of
//! times, with a fixed delay before each re-issue. The policy is read at
//! decision time by the session engine; it is configured through the builder
//! and frozen when the session is built.

use std::time::Duration;

/// Default maximum number of retries per resource.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before a retry is re-issued (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;

/// Bounded-retry configuration for a load session.
///
/// Applies uniformly to every resource in the session. `max_retries` counts
/// re-attempts, not total attempts: a resource with `max_retries = 3` is
/// loaded at most four times before it fails permanently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given retry budget and delay.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Returns the maximum number of retries per resource.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the delay applied before each retry.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Sets the maximum number of retries per resource.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    /// Sets the delay applied before each retry.
    pub fn set_retry_delay(&mut self, retry_delay: Duration) {
        self.retry_delay = retry_delay;
    }

    /// Decides the outcome of a failed verification.
    ///
    /// `attempts` is the per-resource retry counter *after* it has been
    /// incremented for this failure. The budget is exhausted once the counter
    /// exceeds `max_retries`, so a permanent failure always carries
    /// `attempts == max_retries + 1`.
    pub fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts > self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                delay: self.retry_delay,
            }
        }
    }
}

/// Outcome of a failed verification under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-issue the resource after waiting `delay`.
    Retry {
        /// How long to wait before the re-issue.
        delay: Duration,
    },

    /// Retry budget exhausted; the resource fails permanently.
    GiveUp,
}
