use std::sync::Arc;

use serde_json::Value;

use crate::clock::Clock;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::{RetryExecutor, RetryPolicy};

use super::errors::{IngestError, Result, UpstreamFailure};
use super::rate_limit::{ApiRateLimiter, RateLimitSettings, RateLimitState, rate_limits};
use super::types::{FetchContext, SourceKind};

/// Construction options shared by every source client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitSettings,
    /// Proactive requests-per-second pacing; `None` disables it.
    pub requests_per_second: Option<u32>,
    pub fetch: crate::sync::FetchLimits,
}

impl ClientOptions {
    /// Defaults tuned for one upstream: its assumed budget and pacing.
    #[must_use]
    pub fn for_source(kind: SourceKind) -> Self {
        let (assumed_limit, rps) = match kind {
            SourceKind::GitHub => (rate_limits::GITHUB_HOURLY_LIMIT, rate_limits::GITHUB_DEFAULT_RPS),
            SourceKind::Confluence => (
                rate_limits::CONFLUENCE_ASSUMED_LIMIT,
                rate_limits::CONFLUENCE_DEFAULT_RPS,
            ),
        };
        Self {
            rate_limit: RateLimitSettings::default().with_assumed_limit(assumed_limit),
            requests_per_second: Some(rps),
            ..Self::default()
        }
    }
}

/// A decoded JSON response plus its headers.
#[derive(Debug, Clone)]
pub struct JsonPage {
    pub body: Value,
    pub headers: HttpHeaders,
}

/// Authenticated request plumbing shared by the GitHub and Confluence
/// clients: header construction, pacing, budget bookkeeping, status checks,
/// JSON decoding and the retry loop.
pub struct ApiSession {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    authorization: String,
    user_agent: String,
    rate_limit: RateLimitState,
    pacer: Option<ApiRateLimiter>,
    executor: RetryExecutor,
    clock: Arc<dyn Clock>,
}

impl ApiSession {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        authorization: impl Into<String>,
        options: &ClientOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limit = RateLimitState::new(options.rate_limit.clone(), Arc::clone(&clock));
        let executor = RetryExecutor::new(
            options.retry.clone(),
            rate_limit.clone(),
            Arc::clone(&clock),
        );
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: authorization.into(),
            user_agent: format!("intake/{}", env!("CARGO_PKG_VERSION")),
            rate_limit,
            pacer: options.requests_per_second.map(ApiRateLimiter::new),
            executor,
            clock,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// GET a JSON document with retries.
    pub async fn get_json(&self, label: &str, url: &str, ctx: &FetchContext<'_>) -> Result<JsonPage> {
        self.executor
            .execute(label, ctx.on_progress, || self.attempt_json(url))
            .await
    }

    /// GET a raw text body with retries; 404 maps to `None` without spending
    /// further attempts.
    pub async fn get_optional_text(
        &self,
        label: &str,
        url: &str,
        accept: &str,
        ctx: &FetchContext<'_>,
    ) -> Result<Option<String>> {
        let result = self
            .executor
            .execute(label, ctx.on_progress, || async {
                let response = self.send(url, accept).await?;
                Ok(response.body_text())
            })
            .await;
        match result {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(label, "optional resource absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// A single GET with no retry loop, for calls whose failure is absorbed by
    /// the caller (the rate-limit refresh).
    pub async fn get_json_once(&self, label: &str, url: &str) -> Result<JsonPage> {
        match self.attempt_json(url).await {
            Ok(page) => Ok(page),
            Err(failure) => {
                let kind = super::errors::classify(&failure);
                Err(IngestError::from_failure(label, kind, failure))
            }
        }
    }

    async fn attempt_json(&self, url: &str) -> std::result::Result<JsonPage, UpstreamFailure> {
        let response = self.send(url, "application/json").await?;
        let body = serde_json::from_slice(&response.body)
            .map_err(|e| UpstreamFailure::decode(format!("invalid JSON from {url}: {e}")))?;
        Ok(JsonPage {
            body,
            headers: response.headers,
        })
    }

    async fn send(&self, url: &str, accept: &str) -> std::result::Result<HttpResponse, UpstreamFailure> {
        if let Some(pacer) = &self.pacer {
            pacer.wait().await;
        }

        let headers: HttpHeaders = vec![
            ("Accept".to_string(), accept.to_string()),
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Authorization".to_string(), self.authorization.clone()),
        ];

        self.rate_limit.consume();
        let response = self
            .transport
            .send(HttpRequest::get(url, headers))
            .await
            .map_err(|e| UpstreamFailure::transport(&e))?;
        self.rate_limit.update_from_headers(&response.headers);

        if !response.is_success() {
            return Err(UpstreamFailure::from_response(&response));
        }
        Ok(response)
    }
}
