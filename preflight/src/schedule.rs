//! Retry scheduling.
//!
//! A failed verification does not re-issue the load inline; the engine
//! enqueues an explicit retry task on a [`RetryScheduler`]. This keeps stack
//! depth bounded and keeps the timed suspension (the configured retry delay)
//! off the completion path, so one resource's wait never blocks another's
//! progress.

use std::time::Duration;

use tracing::debug;

/// A deferred retry unit: re-issues a single-resource load when run.
pub type RetryTask = Box<dyn FnOnce() + Send + 'static>;

/// Defers retry tasks, optionally by a delay.
pub trait RetryScheduler: Send + Sync + 'static {
    /// Runs `task` after `delay`, without blocking the caller.
    fn schedule(&self, delay: Duration, task: RetryTask);
}

/// Timer-backed scheduler using the ambient tokio runtime.
///
/// This is the default scheduler. `schedule` spawns onto the current runtime,
/// so sessions using it must be started from within one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRetryScheduler;

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&self, delay: Duration, task: RetryTask) {
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task();
        });
    }
}

/// Scheduler that ignores the delay and runs tasks inline.
///
/// Suitable for tests and for zero-delay configurations driven outside a
/// runtime. Retries still flow through the scheduler seam, so the engine's
/// control flow is identical to the timed case.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineRetryScheduler;

impl RetryScheduler for InlineRetryScheduler {
    fn schedule(&self, delay: Duration, task: RetryTask) {
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "inline scheduler ignoring retry delay");
        }
        task();
    }
}
