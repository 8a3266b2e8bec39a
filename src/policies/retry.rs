//! # Retry policy for service discovery.
//!
//! [`RetryPolicy`] is a pure generator of the pauses taken between discovery
//! attempts. It knows nothing about peripherals or caches; the orchestrator
//! walks [`RetryPolicy::delays`] and decides what to do around each pause.
//!
//! ## Shape
//! ```text
//! attempt ─► delay[0] ─► attempt ─► delay[1] ─► ... ─► delay[k-1] ─► final attempt
//!
//! k = number of delays yielded, where
//!   k <= max_attempts - 1
//!   delay[0] + ... + delay[k-1] <= timeout
//! ```
//!
//! With the defaults (`first = 3s`, `factor = 2`, `max_attempts = 5`, `timeout = 15s`)
//! the sequence is `3s, 6s` (the next delay, 12s, would overrun the 15s budget),
//! giving three attempts in total.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Bounded exponential retry schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Growth of the pause between attempts.
    pub backoff: BackoffPolicy,
    /// Upper bound on attempts, including the final unretried one (min 1).
    pub max_attempts: u32,
    /// Overall budget, measured from the first attempt.
    ///
    /// The pauses alone never sum past it, and the orchestrator skips any pause
    /// that would end past it counting the time attempts took.
    pub timeout: Duration,
    /// Per-attempt time limit (`None` = unbounded). Expiry counts as a failed attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    /// - `backoff = BackoffPolicy::default()` (3s doubling)
    /// - `max_attempts = 5`
    /// - `timeout = 15s`
    /// - `attempt_timeout = 15s`
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            max_attempts: 5,
            timeout: Duration::from_secs(15),
            attempt_timeout: Some(Duration::from_secs(15)),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries: only the final attempt is made.
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the sequence of pauses between attempts.
    pub fn delays(&self) -> RetryDelays {
        RetryDelays {
            backoff: self.backoff,
            remaining: self.max_attempts.saturating_sub(1),
            index: 0,
            budget: self.timeout,
            spent: Duration::ZERO,
        }
    }

    /// Per-attempt time limit, treating zero as unbounded.
    #[inline]
    pub fn attempt_limit(&self) -> Option<Duration> {
        self.attempt_timeout.filter(|d| *d > Duration::ZERO)
    }
}

/// Iterator over retry pauses. Fused: once exhausted it keeps returning `None`.
#[derive(Clone, Debug)]
pub struct RetryDelays {
    backoff: BackoffPolicy,
    remaining: u32,
    index: u32,
    budget: Duration,
    spent: Duration,
}

impl Iterator for RetryDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        let delay = self.backoff.next(self.index);
        let spent = self.spent.saturating_add(delay);
        if spent > self.budget {
            self.remaining = 0;
            return None;
        }
        self.spent = spent;
        self.index += 1;
        self.remaining -= 1;
        Some(delay)
    }
}

impl std::iter::FusedIterator for RetryDelays {}
