//! Retry and pacing policy for batch submissions.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How often, and how patiently, a batch re-submits a failed transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per transaction, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one.
    pub base_delay: Duration,
    /// Ceiling for the exponential delay.
    pub max_delay: Duration,
    /// Fraction of the delay randomised, in `[0, 1]`.
    pub jitter: f64,
    /// Gap kept between consecutive submissions to respect ledger rate limits.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
            pacing: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no delays.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
            pacing: Duration::ZERO,
        }
    }

    /// Retries without any waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::none()
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff before retry number `attempt` (1 = first retry), without jitter.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff before retry number `attempt`, with jitter applied.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-jitter..=jitter);
        base.mul_f64(1.0 + spread)
    }
}
