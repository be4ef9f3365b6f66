//! Resilient fetch executor.
//!
//! Wraps a single adapter invocation with rate-limit gating, a per-attempt
//! timeout, bounded retries with a jittered delay, and cancellation. A source
//! that exhausts its attempts yields an empty outcome instead of an error.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::models::{FetchConfig, RawCandidate, SearchQuery, SourceId};
use crate::pipeline::RateLimiter;
use crate::sources::{FetchCause, FetchError, SourceAdapter};

/// Retry bounds for one source invocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts; never zero
    pub base_delay: Duration,
    /// Upper bound of the random extra delay
    pub jitter: Duration,
    /// Time allowed for a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: base_delay.max(Duration::from_millis(1)),
            jitter: Duration::ZERO,
            attempt_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
            .with_jitter(Duration::from_millis(config.jitter_ms))
            .with_attempt_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before the next attempt: `base_delay + uniform(0..=jitter)`.
    pub fn delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base_delay;
        }
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.base_delay + Duration::from_millis(extra)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// What one source contributed to a run.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source: SourceId,
    pub candidates: Vec<RawCandidate>,
    pub attempts: u32,
    pub failed_attempts: u32,
    pub exhausted: bool,
    pub cancelled: bool,
    pub last_error: Option<FetchError>,
}

impl FetchOutcome {
    fn new(source: SourceId) -> Self {
        Self {
            source,
            candidates: Vec::new(),
            attempts: 0,
            failed_attempts: 0,
            exhausted: false,
            cancelled: false,
            last_error: None,
        }
    }

    fn into_cancelled(mut self) -> Self {
        log::warn!("{}: fetch cancelled after {} attempt(s)", self.source, self.attempts);
        self.cancelled = true;
        self
    }

    /// True when the adapter eventually answered.
    pub fn succeeded(&self) -> bool {
        !self.exhausted && !self.cancelled
    }
}

/// Runs adapters under a retry policy and a shared rate limiter.
#[derive(Debug, Clone)]
pub struct FetchExecutor {
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
}

impl FetchExecutor {
    pub fn new(policy: RetryPolicy, limiter: Arc<RateLimiter>) -> Self {
        Self { policy, limiter }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch candidates from one adapter. Never fails; see [`FetchOutcome`].
    pub async fn fetch(
        &self,
        adapter: &dyn SourceAdapter,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let source = adapter.id().clone();
        let mut outcome = FetchOutcome::new(source.clone());

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return outcome.into_cancelled(),
            _ = self.limiter.acquire(&source) => {}
        }

        for attempt in 1..=self.policy.max_attempts {
            outcome.attempts = attempt;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return outcome.into_cancelled(),
                r = tokio::time::timeout(self.policy.attempt_timeout, adapter.search(query)) => r,
            };

            let error = match result {
                Ok(Ok(candidates)) => {
                    if attempt > 1 {
                        log::info!("{}: succeeded on attempt {}", source, attempt);
                    }
                    outcome.candidates = candidates;
                    return outcome;
                }
                Ok(Err(e)) => e,
                Err(_) => FetchError::new(
                    source.clone(),
                    FetchCause::Timeout(self.policy.attempt_timeout),
                ),
            };

            outcome.failed_attempts += 1;
            log::warn!(
                "{}: attempt {}/{} failed: {}",
                source,
                attempt,
                self.policy.max_attempts,
                error.cause
            );
            outcome.last_error = Some(error);

            if attempt < self.policy.max_attempts {
                let delay = self.policy.delay();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return outcome.into_cancelled(),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        log::warn!(
            "{}: giving up after {} attempts, source contributes nothing",
            source,
            outcome.attempts
        );
        outcome.exhausted = true;
        outcome
    }
}
