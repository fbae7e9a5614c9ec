use std::time::Duration;

use crate::config::SessionConfig;

/// Delay policy for reconnect attempts
///
/// The first retry waits the base delay, every later consecutive failure
/// waits the base delay doubled once. Both are capped at the ceiling, so the
/// sequence escalates a single step and then stays flat. The very first
/// retry therefore comes after 5 s instead of 10 s with the defaults, trading
/// a quicker first recovery for one extra request against a dead backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub ceiling: Duration,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self { base, ceiling }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.reconnect_delay(), config.reconnect_ceiling())
    }

    /// Delay before the retry that follows `consecutive_failures` failures (1-based)
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let delay = if consecutive_failures <= 1 {
            self.base
        } else {
            self.base.saturating_mul(2)
        };
        delay.min(self.ceiling)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
