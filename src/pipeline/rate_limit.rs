//! Per-source minimum-interval gate.
//!
//! Lives for the whole process so repeated runs do not hit a source more
//! often than the configured interval.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::SourceId;

/// Rate limiter keyed by source.
#[derive(Debug)]
pub struct RateLimiter {
    next_allowed: Mutex<HashMap<SourceId, Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            next_allowed: Mutex::new(HashMap::new()),
            min_interval,
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Reserve the next slot for `source` and return how long to wait for it.
    ///
    /// The reservation happens under the lock, so concurrent callers for the
    /// same source get slots `min_interval` apart.
    pub fn reserve(&self, source: &SourceId) -> Duration {
        if self.min_interval.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let mut next_allowed = self
            .next_allowed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let slot = match next_allowed.get(source) {
            Some(&next) if next > now => next,
            _ => now,
        };
        next_allowed.insert(source.clone(), slot + self.min_interval);
        slot - now
    }

    /// Wait until `source` may be invoked again.
    pub async fn acquire(&self, source: &SourceId) -> Duration {
        let wait = self.reserve(source);
        if !wait.is_zero() {
            log::debug!("{}: rate limited, waiting {:?}", source, wait);
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
