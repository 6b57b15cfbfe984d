//! Retry policies for handling transient failures.
//!
//! A [`Retryer`] is stateful and scoped to one invocation: the pipeline clones the
//! configured policy before entering its execution loop, so attempts never leak
//! across calls. On each retryable failure the policy either returns (possibly after
//! sleeping) to permit another attempt, or propagates the failure.

use crate::error::{Error, Result, RetryableError};
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// Per-invocation retry policy.
///
/// # Examples
///
/// ```
/// use veneer::{ExponentialBackoff, Retryer};
/// use std::time::Duration;
///
/// // 100 ms growing 1.5x per attempt, capped at 1 s, at most 3 attempts.
/// let retryer = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 3);
/// let fresh = retryer.clone_boxed();
/// # let _ = fresh;
/// ```
#[async_trait]
pub trait Retryer: Send + Sync {
    /// If another attempt is permitted, returns the error back to the caller,
    /// possibly after sleeping. Otherwise propagates it as `Err`.
    async fn continue_or_propagate(&mut self, err: RetryableError) -> Result<RetryableError>;

    /// A fresh-state clone for a new invocation.
    fn clone_boxed(&self) -> Box<dyn Retryer>;
}

/// The default policy: exponential backoff at a factor of 1.5.
///
/// The k-th sleep lasts `min(period * 1.5^(k-1), max_period)`. When the failure
/// carries a `retry_after` timestamp, the sleep is the time until that instant,
/// clamped above by `max_period`; an instant already in the past retries
/// immediately.
#[derive(Debug)]
pub struct ExponentialBackoff {
    period: Duration,
    max_period: Duration,
    max_attempts: u32,
    attempt: u32,
    slept_for: Duration,
}

impl ExponentialBackoff {
    /// A policy with explicit backoff parameters.
    pub fn new(period: Duration, max_period: Duration, max_attempts: u32) -> Self {
        Self {
            period,
            max_period,
            max_attempts,
            attempt: 1,
            slept_for: Duration::ZERO,
        }
    }

    /// The attempt about to be made, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Total time this policy has slept.
    pub fn slept_for(&self) -> Duration {
        self.slept_for
    }

    fn next_interval(&self, attempt: u32) -> Duration {
        let factor = 1.5f64.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.period.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_period)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(1), 5)
    }
}

#[async_trait]
impl Retryer for ExponentialBackoff {
    async fn continue_or_propagate(&mut self, err: RetryableError) -> Result<RetryableError> {
        let attempt = self.attempt;
        self.attempt += 1;
        if attempt >= self.max_attempts {
            return Err(Error::Retryable(err));
        }

        let interval = match err.retry_after {
            Some(at) => match at.duration_since(SystemTime::now()) {
                Ok(until) => until.min(self.max_period),
                // Already past: retry without sleeping.
                Err(_) => return Ok(err),
            },
            None => self.next_interval(attempt),
        };

        tokio::time::sleep(interval).await;
        self.slept_for += interval;
        Ok(err)
    }

    fn clone_boxed(&self) -> Box<dyn Retryer> {
        Box::new(Self::new(self.period, self.max_period, self.max_attempts))
    }
}

/// The sentinel policy that never retries: every failure propagates on first sight.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

#[async_trait]
impl Retryer for NeverRetry {
    async fn continue_or_propagate(&mut self, err: RetryableError) -> Result<RetryableError> {
        Err(Error::Retryable(err))
    }

    fn clone_boxed(&self) -> Box<dyn Retryer> {
        Box::new(NeverRetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn failure(retry_after: Option<SystemTime>) -> RetryableError {
        RetryableError {
            method: Method::GET,
            retry_after,
            cause: Box::new(Error::Configuration("boom".to_string())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_grow_by_half() {
        let mut retryer =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 3);

        let err = retryer.continue_or_propagate(failure(None)).await.unwrap();
        assert_eq!(retryer.slept_for(), Duration::from_millis(100));

        let err = retryer.continue_or_propagate(err).await.unwrap();
        assert_eq!(retryer.slept_for(), Duration::from_millis(250));

        let exhausted = retryer.continue_or_propagate(err).await.unwrap_err();
        assert!(exhausted.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_caps_at_max_period() {
        let mut retryer =
            ExponentialBackoff::new(Duration::from_millis(800), Duration::from_secs(1), 10);

        let err = retryer.continue_or_propagate(failure(None)).await.unwrap();
        assert_eq!(retryer.slept_for(), Duration::from_millis(800));

        // 800 * 1.5 = 1200, clamped to the 1000 ms ceiling.
        retryer.continue_or_propagate(err).await.unwrap();
        assert_eq!(retryer.slept_for(), Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_clamps_to_max_period() {
        let mut retryer =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 5);
        let at = SystemTime::now() + Duration::from_secs(10);

        let before = tokio::time::Instant::now();
        retryer.continue_or_propagate(failure(Some(at))).await.unwrap();
        let slept = tokio::time::Instant::now() - before;

        assert!(
            slept <= Duration::from_millis(1050),
            "slept {slept:?}, expected about 1s"
        );
        assert!(slept >= Duration::from_millis(950), "slept {slept:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn past_retry_after_returns_immediately() {
        let mut retryer = ExponentialBackoff::default();
        let at = SystemTime::now() - Duration::from_secs(5);

        retryer.continue_or_propagate(failure(Some(at))).await.unwrap();
        assert_eq!(retryer.slept_for(), Duration::ZERO);
        assert_eq!(retryer.attempt(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_the_latest_error() {
        let mut retryer =
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(10), 1);
        let err = retryer.continue_or_propagate(failure(None)).await.unwrap_err();
        assert!(matches!(err, Error::Retryable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn clone_resets_state() {
        let mut retryer =
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 5);
        let err = retryer.continue_or_propagate(failure(None)).await.unwrap();
        let err = retryer.continue_or_propagate(err).await.unwrap();
        assert_eq!(retryer.attempt(), 3);
        assert_eq!(retryer.slept_for(), Duration::from_millis(250));

        // A clone starts over: its first sleep is the base period again.
        let mut fresh = retryer.clone_boxed();
        let before = tokio::time::Instant::now();
        fresh.continue_or_propagate(err).await.unwrap();
        assert_eq!(tokio::time::Instant::now() - before, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn never_retry_always_propagates() {
        let mut retryer = NeverRetry;
        let err = retryer.continue_or_propagate(failure(None)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
