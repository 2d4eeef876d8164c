//! Bounded exponential backoff around transport attempts.
//!
//! Authentication failures (HTTP 401) and missing profiles (HTTP 404) are
//! terminal: retrying them only delays the answer. Everything else is treated
//! as transient until the attempt budget runs out.

use promptgate_core::{ScanError, TransportError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubles for each later one.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// What the policy does with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    Terminal,
}

/// Classify a transport failure.
pub fn classify(err: &TransportError) -> Disposition {
    match err.status() {
        Some(401) | Some(404) => Disposition::Terminal,
        _ => Disposition::Retry,
    }
}

/// Why [`RetryPolicy::execute`] gave up.
#[derive(Debug)]
pub enum RetryError {
    /// A terminal failure on the given attempt (1-based).
    Terminal { attempt: u32, cause: TransportError },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: TransportError },
}

impl RetryError {
    /// Convert into the scan-level error, naming the profile for 404s.
    pub fn into_scan_error(self, profile: &str) -> ScanError {
        match self {
            RetryError::Terminal { cause, .. } if cause.status() == Some(401) => {
                ScanError::Authentication
            }
            RetryError::Terminal { cause, .. } if cause.status() == Some(404) => {
                ScanError::ProfileNotFound {
                    profile: profile.to_string(),
                }
            }
            RetryError::Terminal { attempt, cause } => ScanError::RetriesExhausted {
                attempts: attempt,
                last: cause,
            },
            RetryError::Exhausted { attempts, last } => {
                ScanError::RetriesExhausted { attempts, last }
            }
        }
    }
}

/// Retry budget and backoff schedule.
///
/// Holds no per-call state, so one policy can drive any number of concurrent
/// operations; each `execute` call owns its own counter and timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Sleep before attempt `attempt` (0-based): zero for the first attempt,
    /// then `base * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1))
    }

    /// Run `operation` until it succeeds, fails terminally, or the budget is
    /// spent. The operation receives the 0-based attempt number.
    ///
    /// Backoff uses the async timer, so dropping the returned future cancels
    /// a pending sleep as well as the in-flight attempt.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                debug!(
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if classify(&err) == Disposition::Terminal {
                        warn!(attempt = attempt + 1, error = %err, "Terminal scan failure, not retrying");
                        return Err(RetryError::Terminal {
                            attempt: attempt + 1,
                            cause: err,
                        });
                    }

                    if attempt >= self.max_retries {
                        warn!(attempts = attempt + 1, error = %err, "Retry budget exhausted");
                        return Err(RetryError::Exhausted {
                            attempts: attempt + 1,
                            last: err,
                        });
                    }

                    warn!(attempt = attempt + 1, error = %err, "Retryable scan failure");
                }
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn connection_error() -> TransportError {
        TransportError::Connection("connection refused".to_string())
    }

    fn status(code: u16) -> TransportError {
        TransportError::HttpStatus {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        assert!(policy.backoff(200) >= Duration::from_secs(u32::MAX as u64));
        assert_eq!(policy.max_attempts(), u32::MAX);
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(&status(401)), Disposition::Terminal);
        assert_eq!(classify(&status(404)), Disposition::Terminal);
        assert_eq!(classify(&status(500)), Disposition::Retry);
        assert_eq!(classify(&status(429)), Disposition::Retry);
        assert_eq!(classify(&connection_error()), Disposition::Retry);
        assert_eq!(
            classify(&TransportError::Timeout(Duration::from_secs(30))),
            Disposition::Retry
        );
        assert_eq!(
            classify(&TransportError::Malformed("eof".into())),
            Disposition::Retry
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .execute(|_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(connection_error())
                    } else {
                        Ok("scanned")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "scanned");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(status(401)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let err = result.unwrap_err().into_scan_error("dev-profile");
        assert!(matches!(err, ScanError::Authentication));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_profile_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(status(404)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result.unwrap_err().into_scan_error("dev-profile") {
            ScanError::ProfileNotFound { profile } => assert_eq!(profile, "dev-profile"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_cause() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .execute(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(TransportError::HttpStatus {
                        status: 500 + attempt as u16,
                        body: String::new(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result.unwrap_err().into_scan_error("p") {
            ScanError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert_eq!(last.status(), Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_are_observed() {
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = policy.execute(|_| async { Err(connection_error()) }).await;

        // 1s + 2s + 4s
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_no_retry_policy_makes_one_attempt() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::no_retry();

        let result: Result<(), _> = policy
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(connection_error()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 1, .. })
        ));
    }
}
