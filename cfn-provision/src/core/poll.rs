//! Deterministic poll scheduling for the convergence waiter.

use std::time::Duration;

/// Interval and upper bound for one convergence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl WaitPolicy {
    pub const fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }
}

/// What the waiter should do after observing an in-progress status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Sleep for the given duration, then query again.
    Sleep(Duration),
    /// Sleeping again would exceed `max_wait`.
    GiveUp,
}

/// Decide the next step given the time already spent waiting.
///
/// The last sleep is shortened so the final query happens exactly at `max_wait`.
pub fn next_poll(policy: &WaitPolicy, elapsed: Duration) -> PollDecision {
    let remaining = policy.max_wait.saturating_sub(elapsed);
    if remaining.is_zero() {
        return PollDecision::GiveUp;
    }
    PollDecision::Sleep(policy.poll_interval.min(remaining))
}
