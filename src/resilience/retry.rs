//! Exponential backoff retry with jitter.
//!
//! The executor knows nothing about the operation it wraps. Every call site
//! passes its own [`RetryPolicy`], which carries both the backoff parameters
//! and the classifier deciding which failures are transient.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackoffSettings;
use crate::error::{AppError, FaultCode, Result};
use crate::observability::get_metrics;

/// Fault codes treated as transient unless a policy says otherwise.
pub const DEFAULT_RETRYABLE_CODES: [FaultCode; 3] = [
    FaultCode::ConnectionReset,
    FaultCode::TimedOut,
    FaultCode::HostNotFound,
];

/// Upper bound of the random jitter, as a fraction of the computed delay.
pub const JITTER_FACTOR: f64 = 0.3;

/// Decides whether a failure is worth another attempt.
pub type Classifier = Arc<dyn Fn(&AppError) -> bool + Send + Sync>;

/// Backoff parameters and transient-error classifier for one call site.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retryable_codes: Vec<FaultCode>,
    classifier: Option<Classifier>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("retryable_codes", &self.retryable_codes)
            .field("custom_classifier", &self.classifier.is_some())
            .finish()
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(10),
            retryable_codes: DEFAULT_RETRYABLE_CODES.to_vec(),
            classifier: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_retryable_codes(mut self, codes: &[FaultCode]) -> Self {
        self.retryable_codes = codes.to_vec();
        self
    }

    /// Replaces the default classification below.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&AppError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Transient when the error carries a listed fault code, a 5xx status,
    /// or a rate-limit message, unless a custom classifier is set.
    pub fn is_retryable(&self, error: &AppError) -> bool {
        if let Some(classifier) = &self.classifier {
            return classifier(error);
        }

        if let Some(code) = error.fault_code() {
            if self.retryable_codes.contains(&code) {
                return true;
            }
        }

        if error.upstream_status().is_some_and(|status| status >= 500) {
            return true;
        }

        error.to_string().to_lowercase().contains("rate limit")
    }

    /// `min(base_delay * 2^attempt, max_delay)`, before jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl From<&BackoffSettings> for RetryPolicy {
    fn from(settings: &BackoffSettings) -> Self {
        RetryPolicy::new(settings.max_retries, Duration::from_millis(settings.base_delay_ms))
            .with_max_delay(Duration::from_millis(settings.max_delay_ms))
    }
}

/// Counters for retry activity.
#[derive(Debug, Default)]
pub struct RetryStats {
    pub attempts: AtomicU64,
    pub retries: AtomicU64,
    pub recovered: AtomicU64,
    pub exhausted: AtomicU64,
    pub rejected: AtomicU64,
}

impl RetryStats {
    pub fn snapshot(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStatsSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub recovered: u64,
    pub exhausted: u64,
    pub rejected: u64,
}

/// Runs failable async operations under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryExecutor {
    jitter: f64,
    stats: RetryStats,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self {
            jitter: JITTER_FACTOR,
            stats: RetryStats::default(),
        }
    }

    /// Deterministic delays, for tests that assert on the exact schedule.
    pub fn without_jitter() -> Self {
        Self {
            jitter: 0.0,
            stats: RetryStats::default(),
        }
    }

    pub fn stats(&self) -> RetryStatsSnapshot {
        self.stats.snapshot()
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        delay + delay.mul_f64(rand::random::<f64>() * self.jitter)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent. The error returned is always the one the operation
    /// produced last, untouched.
    pub async fn execute<T, F, Fut>(
        &self,
        operation_name: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            self.stats.attempts.fetch_add(1, Ordering::Relaxed);

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.stats.recovered.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !policy.is_retryable(&error) {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    operation = operation_name,
                    error = %error,
                    "Operation failed with non-retryable error"
                );
                return Err(error);
            }

            if attempt >= policy.max_retries {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                get_metrics().record_retry_exhausted(operation_name);
                tracing::error!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    error = %error,
                    code = error.fault_code().map(|c| c.as_str()),
                    "Operation failed after retries"
                );
                return Err(error);
            }

            let delay = self.jittered(policy.backoff_delay(attempt));
            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            get_metrics().record_retry(operation_name);
            tracing::warn!(
                operation = operation_name,
                attempt = attempt + 1,
                max_retries = policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying operation"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(10));
        assert_eq!(policy.backoff_delay(40), Duration::from_secs(10));
    }

    #[test]
    fn test_classifier() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        assert!(policy.is_retryable(&AppError::service_unavailable("Platform temporarily unavailable")));
        assert!(policy.is_retryable(&AppError::network(FaultCode::ConnectionReset, "reset")));
        assert!(policy.is_retryable(&AppError::Internal(anyhow::anyhow!("Rate limit reached"))));
        assert!(!policy.is_retryable(&AppError::InvalidRefreshToken));
        assert!(!policy.is_retryable(&AppError::campaign_not_found("cmp_x")));
        assert!(!policy.is_retryable(&AppError::Upstream {
            status: Some(400),
            code: None,
            message: "bad request".to_string(),
        }));
    }

    #[test]
    fn test_classifier_honours_policy_codes() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10))
            .with_retryable_codes(&[FaultCode::ConnectionReset, FaultCode::TimedOut]);

        assert!(policy.is_retryable(&AppError::network(FaultCode::TimedOut, "slow")));
        assert!(!policy.is_retryable(&AppError::network(FaultCode::HostNotFound, "dns")));
    }

    #[test]
    fn test_policy_from_settings() {
        let policy = RetryPolicy::from(&BackoffSettings::new(2, 1500));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(1500));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let executor = RetryExecutor::new();
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let delay = executor.jittered(base);
            assert!(delay >= base);
            assert!(delay <= base.mul_f64(1.0 + JITTER_FACTOR));
        }
    }
}
