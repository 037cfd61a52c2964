//! Bounded waiting on an external condition.
//!
//! Both the public-host readiness probe and the platform status poll are the
//! same shape: check something, sleep a fixed interval, give up after a fixed
//! number of attempts. [`bounded_wait`] is that loop.

use std::future::Future;
use std::time::Duration;

use tracing::trace;

/// Fixed-interval attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two consecutive attempts.
    pub interval: Duration,
    /// Total number of checks performed before giving up (at least 1).
    pub max_attempts: u32,
}

impl WaitPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_millis(interval_ms: u64, max_attempts: u32) -> Self {
        Self::new(Duration::from_millis(interval_ms), max_attempts)
    }

    /// Longest time the loop can spend sleeping.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check<T> {
    /// The condition holds; stop waiting.
    Ready(T),
    /// Not yet; try again after the interval.
    Pending,
}

/// How a bounded wait ended when no check returned an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl<T> WaitOutcome<T> {
    /// Number of checks that were performed.
    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Ready { attempts, .. } | WaitOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// Run `check` until it reports [`Check::Ready`], returns an error, or the
/// attempt budget is spent.
///
/// The first check happens immediately. The interval is slept only between
/// attempts, never after the last one, so an exhausted wait performs exactly
/// `max_attempts` checks. An error from `check` aborts the loop at once.
pub async fn bounded_wait<T, E, F, Fut>(
    policy: WaitPolicy,
    mut check: F,
) -> Result<WaitOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Check<T>, E>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if let Check::Ready(value) = check(attempt).await? {
            return Ok(WaitOutcome::Ready {
                value,
                attempts: attempt,
            });
        }

        trace!(attempt, max_attempts, "condition pending");

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Ok(WaitOutcome::Exhausted {
        attempts: max_attempts,
    })
}
