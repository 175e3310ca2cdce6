// Jittered delay between sequential upstream requests

use rand::Rng;
use std::time::Duration;

/// Uniform random delay in `[min_delay, max_delay]` applied after each request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottlePolicy {
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl ThrottlePolicy {
    /// Bounds are swapped if given in the wrong order
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self {
                min_delay,
                max_delay,
            }
        } else {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// No delay at all, for tests
    pub fn none() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.max_delay.is_zero()
    }

    pub fn next_delay(&self) -> Duration {
        if self.min_delay == self.max_delay {
            return self.min_delay;
        }
        let min_ms = self.min_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    /// Sleep for one jittered delay
    pub async fn pause(&self) {
        if self.is_disabled() {
            return;
        }
        tokio::time::sleep(self.next_delay()).await;
    }
}
