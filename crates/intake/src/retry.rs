//! Bounded retry for upstream calls.
//!
//! Every upstream call runs through [`RetryExecutor::execute`]. The executor
//! waits on the shared rate-limit budget before each attempt, classifies every
//! failure before sleeping, and picks the delay from a static [`RetryPolicy`]
//! table.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::platform::{
    ErrorKind, IngestError, ProgressCallback, RateLimitState, UpstreamFailure, classify,
};
use crate::sync::{
    DEFAULT_MAX_ATTEMPTS, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, PullProgress, RATE_LIMIT_WINDOW_MS,
    emit,
};

/// How long to wait before retrying one kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Fail immediately.
    Never,
    /// Always wait the same window.
    Fixed(Duration),
    /// `min(base * 2^(attempt - 1), cap)`.
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    /// Delay after failed attempt `attempt` (1-indexed), or `None` when this
    /// kind is never retried.
    #[must_use]
    pub fn delay(self, attempt: u32) -> Option<Duration> {
        match self {
            Backoff::Never => None,
            Backoff::Fixed(window) => Some(window),
            Backoff::Exponential { base, cap } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                Some(base.saturating_mul(factor).min(cap))
            }
        }
    }
}

/// Static retry table: error kind → backoff rule, plus an attempt bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub rate_limited: Backoff,
    pub server_or_network: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limited: Backoff::Fixed(Duration::from_millis(RATE_LIMIT_WINDOW_MS)),
            server_or_network: Backoff::Exponential {
                base: Duration::from_millis(INITIAL_BACKOFF_MS),
                cap: Duration::from_millis(MAX_BACKOFF_MS),
            },
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom values.
    #[must_use]
    pub fn new(max_attempts: u32, rate_limit_window: Duration, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            rate_limited: Backoff::Fixed(rate_limit_window),
            server_or_network: Backoff::Exponential { base, cap },
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            rate_limited: Backoff::Never,
            server_or_network: Backoff::Never,
        }
    }

    #[must_use]
    pub fn backoff_for(&self, kind: ErrorKind) -> Backoff {
        match kind {
            ErrorKind::RateLimited => self.rate_limited,
            ErrorKind::ServerOrNetwork => self.server_or_network,
            ErrorKind::NotFound | ErrorKind::Auth | ErrorKind::NonRetryable => Backoff::Never,
        }
    }

    /// Delay before retrying after attempt `attempt` failed with `kind`.
    #[must_use]
    pub fn delay_for(&self, kind: ErrorKind, attempt: u32) -> Option<Duration> {
        self.backoff_for(kind).delay(attempt)
    }
}

/// One failed attempt inside a single `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_number: u32,
    pub classified_error: ErrorKind,
    pub operation_label: String,
}

/// Runs upstream operations under the retry policy.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    rate_limit: RateLimitState,
    clock: Arc<dyn Clock>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, rate_limit: RateLimitState, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            rate_limit,
            clock,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` until it succeeds, fails with a non-retryable kind,
    /// or runs out of attempts.
    ///
    /// No sleep follows the final attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        on_progress: Option<&ProgressCallback>,
        mut operation: F,
    ) -> Result<T, IngestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamFailure>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            if let Some(waited) = self.rate_limit.wait_if_needed().await
                && !waited.is_zero()
            {
                emit(
                    on_progress,
                    PullProgress::RateLimitWait {
                        label: label.to_string(),
                        wait_ms: waited.as_millis() as u64,
                    },
                );
            }

            let failure = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(label, attempts = attempt, "recovered after retry");
                        emit(
                            on_progress,
                            PullProgress::Recovered {
                                label: label.to_string(),
                                attempts: attempt,
                            },
                        );
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let record = RetryAttempt {
                attempt_number: attempt,
                classified_error: classify(&failure),
                operation_label: label.to_string(),
            };

            let Some(delay) = self.policy.delay_for(record.classified_error, attempt) else {
                return Err(IngestError::from_failure(
                    label,
                    record.classified_error,
                    failure,
                ));
            };

            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    label,
                    attempts = attempt,
                    kind = %record.classified_error,
                    error = %failure.message,
                    "giving up after exhausting retries"
                );
                return Err(IngestError::RetriesExhausted {
                    label: record.operation_label,
                    attempts: attempt,
                    kind: record.classified_error,
                    message: failure.message,
                });
            }

            tracing::debug!(
                "{} failed ({}), retrying in {:?} (attempt {}): {}",
                label,
                record.classified_error,
                delay,
                attempt,
                failure.message
            );
            emit(
                on_progress,
                PullProgress::RetryBackoff {
                    label: label.to_string(),
                    attempt,
                    kind: record.classified_error,
                    delay_ms: delay.as_millis() as u64,
                },
            );
            self.clock.sleep(delay).await;
        }
    }
}
