//! GitHub API data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::RateLimitInfo;

/// Default REST API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Media type that makes `/readme` return the raw file.
pub const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// A single rate limit resource entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResource {
    /// Maximum requests allowed per period.
    pub limit: usize,
    /// Requests used in current period.
    #[serde(default)]
    pub used: usize,
    /// Remaining requests in current period.
    pub remaining: usize,
    /// Unix timestamp when the rate limit resets.
    pub reset: u64,
}

impl RateLimitResource {
    /// Get the reset time as a DateTime.
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset as i64, 0).unwrap_or_default()
    }

    pub fn to_info(&self) -> RateLimitInfo {
        RateLimitInfo {
            limit: self.limit,
            remaining: self.remaining,
            reset_at: self.reset_at(),
        }
    }
}

/// The rate limit resources the pull client cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimits {
    /// Core API rate limit (non-search REST endpoints).
    pub core: RateLimitResource,
    /// Search API rate limit.
    #[serde(default)]
    pub search: Option<RateLimitResource>,
    /// GraphQL API rate limit.
    #[serde(default)]
    pub graphql: Option<RateLimitResource>,
}

/// Full rate limit response from `GET /rate_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRateLimitResponse {
    /// All rate limit resources.
    pub resources: Option<GitHubRateLimits>,
    /// Deprecated mirror of `resources.core`.
    #[serde(default)]
    pub rate: Option<RateLimitResource>,
}

impl GitHubRateLimitResponse {
    /// The core budget, preferring `resources.core` over the legacy `rate`.
    pub fn core(&self) -> Option<&RateLimitResource> {
        self.resources
            .as_ref()
            .map(|r| &r.core)
            .or(self.rate.as_ref())
    }
}
