use std::time::Duration;

pub const BASE_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(10_000);

/// Exponential backoff between reconnect attempts: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    max: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        1_u32
            .checked_shl(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(BASE_RECONNECT_DELAY, MAX_RECONNECT_DELAY)
    }
}
