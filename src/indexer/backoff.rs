//! Fixed-delay retry policy with optional jitter and attempt budget.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Backoff used for transient backend failures inside the indexer loop.
///
/// The default is a fixed five-second delay, no jitter, and no attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base delay between attempts.
    pub delay: Duration,
    /// Upper bound of the random extra delay added to each wait.
    pub jitter: Duration,
    /// Consecutive failures tolerated before giving up; `0` means unbounded.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            jitter: Duration::ZERO,
            max_attempts: 0,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay with no jitter and no cap.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
            max_attempts: 0,
        }
    }

    /// Delay to wait after the `attempt`-th consecutive failure (1-based),
    /// or `None` once the attempt budget is spent.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts != 0 && attempt >= self.max_attempts {
            return None;
        }
        Some(self.pause())
    }

    /// Delay for waits that are not failures (idle polling, skipped ranges).
    #[must_use]
    pub fn pause(&self) -> Duration {
        self.delay.saturating_add(self.jitter_sample())
    }

    fn jitter_sample(&self) -> Duration {
        let bound = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if bound == 0 {
            return Duration::ZERO;
        }
        // No rand dependency; sub-second clock noise is enough to spread retries.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        Duration::from_millis(u64::from(nanos) % bound.saturating_add(1))
    }
}
