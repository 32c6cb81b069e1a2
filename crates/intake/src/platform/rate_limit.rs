use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::clock::Clock;
use crate::http::{HttpHeaders, header_get};

use super::types::RateLimitInfo;

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default budgets and pacing per upstream.
pub mod rate_limits {
    /// Authenticated GitHub REST budget per hour.
    pub const GITHUB_HOURLY_LIMIT: usize = 5000;
    /// Confluence Cloud publishes no budget; assume a generous one until
    /// headers say otherwise.
    pub const CONFLUENCE_ASSUMED_LIMIT: usize = 1000;
    /// Below this many remaining requests, calls wait for the window reset.
    pub const DEFAULT_LOW_WATERMARK: usize = 10;
    /// Upper bound on a single reset wait, guarding against bogus reset headers.
    pub const MAX_RESET_WAIT_SECS: u64 = 3600;
    /// Proactive pacing for GitHub (requests per second).
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// Proactive pacing for Confluence (requests per second).
    pub const CONFLUENCE_DEFAULT_RPS: u32 = 5;
}

/// Tunables for [`RateLimitState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Budget assumed before the first refresh.
    pub assumed_limit: usize,
    /// `should_throttle` is true when `remaining < low_watermark`.
    pub low_watermark: usize,
    /// Longest single wait for a window reset.
    pub max_wait: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            assumed_limit: rate_limits::GITHUB_HOURLY_LIMIT,
            low_watermark: rate_limits::DEFAULT_LOW_WATERMARK,
            max_wait: Duration::from_secs(rate_limits::MAX_RESET_WAIT_SECS),
        }
    }
}

impl RateLimitSettings {
    #[must_use]
    pub fn with_assumed_limit(mut self, limit: usize) -> Self {
        self.assumed_limit = limit;
        self
    }

    #[must_use]
    pub fn with_low_watermark(mut self, low_watermark: usize) -> Self {
        self.low_watermark = low_watermark;
        self
    }
}

/// Per-account request budget, shared by handle.
///
/// Cloning yields another handle to the same counters, so concurrent pulls
/// against one account see one budget. The lock is never held across an
/// await point.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Arc<Mutex<RateLimitInfo>>,
    settings: RateLimitSettings,
    clock: Arc<dyn Clock>,
}

impl RateLimitState {
    /// Start optimistic: a full assumed budget that resets now.
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        let info = RateLimitInfo {
            limit: settings.assumed_limit,
            remaining: settings.assumed_limit,
            reset_at: clock.now(),
        };
        Self {
            inner: Arc::new(Mutex::new(info)),
            settings,
            clock,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> RateLimitInfo {
        self.lock().clone()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    /// Replace the counters with freshly reported values.
    pub fn update(&self, info: RateLimitInfo) {
        *self.lock() = info;
    }

    /// Apply `x-ratelimit-*` headers from a response.
    ///
    /// Returns true if any counter was updated.
    pub fn update_from_headers(&self, headers: &HttpHeaders) -> bool {
        let Some(parsed) = parse_rate_limit_headers(headers) else {
            return false;
        };
        let mut state = self.lock();
        if let Some(limit) = parsed.limit {
            state.limit = limit;
        }
        if let Some(remaining) = parsed.remaining {
            state.remaining = remaining;
        }
        if let Some(reset_at) = parsed.reset_at {
            state.reset_at = reset_at;
        }
        true
    }

    /// Account for one dispatched upstream call.
    pub fn consume(&self) {
        let mut state = self.lock();
        state.remaining = state.remaining.saturating_sub(1);
    }

    #[must_use]
    pub fn should_throttle(&self) -> bool {
        self.lock().remaining < self.settings.low_watermark
    }

    /// When throttled, sleep until the window resets and assume the budget is
    /// replenished afterwards.
    ///
    /// Returns the time slept, or `None` if no wait was needed.
    pub async fn wait_if_needed(&self) -> Option<Duration> {
        let reset_at = {
            let state = self.lock();
            if state.remaining >= self.settings.low_watermark {
                return None;
            }
            state.reset_at
        };

        let wait = time_until(reset_at, self.clock.now()).min(self.settings.max_wait);
        if !wait.is_zero() {
            tracing::warn!(
                wait_secs = wait.as_secs(),
                reset_at = %reset_at,
                "rate limit budget low, waiting for reset"
            );
            self.clock.sleep(wait).await;
        }

        let mut state = self.lock();
        state.remaining = state.limit;
        Some(wait)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitInfo> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for RateLimitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitState")
            .field("info", &self.snapshot())
            .field("settings", &self.settings)
            .finish()
    }
}

/// `max(0, reset_at - now)`.
fn time_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset_at - now).to_std().unwrap_or(Duration::ZERO)
}

/// Rate-limit headers as reported by one response. Each header is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: Option<usize>,
    pub remaining: Option<usize>,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Parse `x-ratelimit-limit`, `x-ratelimit-remaining` and `x-ratelimit-reset`
/// (unix seconds).
///
/// Returns `None` when none of the headers are present.
pub fn parse_rate_limit_headers(headers: &HttpHeaders) -> Option<RateLimitHeaders> {
    let limit = header_get(headers, "x-ratelimit-limit").and_then(|v| v.trim().parse().ok());
    let remaining =
        header_get(headers, "x-ratelimit-remaining").and_then(|v| v.trim().parse().ok());
    let reset_at = header_get(headers, "x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    if limit.is_none() && remaining.is_none() && reset_at.is_none() {
        return None;
    }
    Some(RateLimitHeaders {
        limit,
        remaining,
        reset_at,
    })
}

/// A standalone API pacer using the governor crate.
///
/// Spreads requests out proactively, independent of the upstream budget
/// tracked by [`RateLimitState`].
///
/// # Example
///
/// ```ignore
/// use intake::platform::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(10); // 10 requests per second
///
/// // Before each API call:
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new pacer with the specified requests per second (0 is
    /// treated as 1).
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
