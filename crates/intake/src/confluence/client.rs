//! Confluence REST client and resource fetchers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::http::HttpTransport;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::platform::convert::{annotate, time_at};
use crate::platform::paginate::collect_pages;
use crate::platform::{
    ApiSession, ClientOptions, FetchContext, FetchedItems, IngestError, PageRequest, PageStyle,
    RateLimitInfo, RateLimitState, ResourceType, Result, Scope, SourceClient, SourceKind, Target,
    Visit,
};
use crate::sync::FetchLimits;

use super::types::{
    API_PREFIX, BASE_KEY, SPACE_KEY, content_cql, content_expand, content_type, display_since,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Confluence Cloud client speaking REST v1 with basic auth.
pub struct ConfluenceClient {
    session: ApiSession,
    limits: FetchLimits,
}

impl ConfluenceClient {
    /// Create a client for a site such as `https://acme.atlassian.net`.
    pub fn new(base_url: &str, email: &str, api_token: &str, options: ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(REQUEST_TIMEOUT)
            .map_err(|e| IngestError::Config(e.to_string()))?;
        Self::new_with_transport(
            base_url,
            email,
            api_token,
            options,
            Arc::new(transport),
            Arc::new(SystemClock),
        )
    }

    /// Create a client with an explicit transport and clock.
    pub fn new_with_transport(
        base_url: &str,
        email: &str,
        api_token: &str,
        options: ClientOptions,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let (email, api_token) = (email.trim(), api_token.trim());
        if email.is_empty() || api_token.is_empty() {
            return Err(IngestError::auth("Confluence email or API token is missing"));
        }
        let site = site_url(base_url)?;

        let credentials = STANDARD.encode(format!("{email}:{api_token}"));
        let limits = options.fetch.clone();
        let session = ApiSession::new(
            transport,
            site,
            format!("Basic {credentials}"),
            &options,
            clock,
        );
        Ok(Self { session, limits })
    }

    /// Site URL without the `/wiki` suffix.
    #[must_use]
    pub fn site_url(&self) -> &str {
        self.session.base_url()
    }

    /// Content search URL for one content type in one space.
    pub fn content_search_url(
        &self,
        resource: ResourceType,
        space_key: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<String> {
        let kind = content_type(resource).ok_or_else(|| {
            IngestError::invalid_spec(format!("{resource} is not searchable content"))
        })?;
        let endpoint = self.session.url(&format!("{API_PREFIX}/content/search"));
        let url = Url::parse_with_params(
            &endpoint,
            [
                ("cql", content_cql(kind, space_key, since)),
                ("expand", content_expand(resource).to_string()),
            ],
        )
        .map_err(|e| IngestError::Config(format!("invalid URL {endpoint}: {e}")))?;
        Ok(url.to_string())
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            style: PageStyle::Offset,
            page_size: self.limits.page_size,
            max_pages: self.limits.max_pages,
            max_items: None,
        }
    }

    /// Web base for links: the page's `_links.base`, else `{site}/wiki`.
    fn link_base(&self, page_meta: &Value) -> String {
        page_meta
            .pointer("/_links/base")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/wiki", self.site_url()))
    }

    async fn fetch_space(&self, key: &str, seed: Option<&Value>, ctx: &FetchContext<'_>) -> Result<FetchedItems> {
        let mut raw = match seed {
            Some(seed) => seed.clone(),
            None => {
                let path = format!("{API_PREFIX}/space/{key}?expand=description.plain,homepage");
                self.session
                    .get_json(&format!("GET space {key}"), &self.session.url(&path), ctx)
                    .await?
                    .body
            }
        };
        if raw.get(BASE_KEY).is_none() {
            let base = self.link_base(&Value::Null);
            annotate(&mut raw, BASE_KEY, base);
        }
        annotate(&mut raw, SPACE_KEY, key);
        Ok(FetchedItems::single(raw))
    }

    async fn fetch_content(
        &self,
        resource: ResourceType,
        space_key: &str,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchedItems> {
        let url = self.content_search_url(resource, space_key, ctx.since)?;
        tracing::debug!(%resource, space = space_key, since = %display_since(ctx.since), "searching content");
        collect_pages(
            &self.session,
            resource,
            space_key,
            &url,
            self.page_request(),
            ctx,
            |row, page_meta| {
                // CQL compares at minute granularity.
                if !ctx.is_newer(time_at(row, &["/version/when", "/history/lastUpdated/when"])) {
                    return Visit::Skip;
                }
                annotate(row, SPACE_KEY, space_key);
                annotate(row, BASE_KEY, self.link_base(page_meta));
                Visit::Keep
            },
        )
        .await
    }

    async fn fetch_tasks(&self, space_key: &str, ctx: &FetchContext<'_>) -> Result<FetchedItems> {
        let endpoint = self.session.url(&format!("{API_PREFIX}/inlinetasks/search"));
        let url = Url::parse_with_params(&endpoint, [("spaceKey", space_key)])
            .map_err(|e| IngestError::Config(format!("invalid URL {endpoint}: {e}")))?;
        collect_pages(
            &self.session,
            ResourceType::Task,
            space_key,
            url.as_str(),
            self.page_request(),
            ctx,
            |row, page_meta| {
                if !ctx.is_newer(time_at(row, &["/createDate"])) {
                    return Visit::Skip;
                }
                annotate(row, SPACE_KEY, space_key);
                annotate(row, BASE_KEY, self.link_base(page_meta));
                Visit::Keep
            },
        )
        .await
    }

    async fn list_spaces(&self, ctx: &FetchContext<'_>) -> Result<Vec<Target>> {
        let url = self.session.url(&format!("{API_PREFIX}/space?expand=description.plain"));
        let fetched = collect_pages(
            &self.session,
            ResourceType::Space,
            "all spaces",
            &url,
            self.page_request(),
            ctx,
            |row, page_meta| {
                annotate(row, BASE_KEY, self.link_base(page_meta));
                Visit::Keep
            },
        )
        .await?;
        if let Some(e) = &fetched.failure {
            tracing::warn!(listed = fetched.items.len(), error = %e, "space listing incomplete");
        }

        Ok(fetched
            .items
            .into_iter()
            .filter_map(|row| {
                let key = row.get("key")?.as_str()?.to_string();
                Some(Target::Space {
                    key,
                    seed: Some(row),
                })
            })
            .collect())
    }
}

/// Normalize a configured base URL to the site root.
fn site_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/wiki").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(IngestError::Config("Confluence base URL is empty".to_string()));
    }
    Url::parse(trimmed)
        .map_err(|e| IngestError::Config(format!("invalid Confluence base URL {trimmed}: {e}")))?;
    Ok(trimmed.to_string())
}

#[async_trait]
impl SourceClient for ConfluenceClient {
    fn source_kind(&self) -> SourceKind {
        SourceKind::Confluence
    }

    fn rate_limit(&self) -> &RateLimitState {
        self.session.rate_limit()
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.session.clock()
    }

    /// Confluence Cloud has no budget endpoint; headers seen on regular calls
    /// still update the state.
    async fn fetch_rate_limit(&self) -> Result<Option<RateLimitInfo>> {
        Ok(None)
    }

    async fn resolve_targets(&self, scope: &Scope, ctx: &FetchContext<'_>) -> Result<Vec<Target>> {
        match scope {
            Scope::Space { key: Some(key) } => Ok(vec![Target::space(key.as_str())]),
            Scope::Space { key: None } => self.list_spaces(ctx).await,
            Scope::Owner { .. } | Scope::Repositories { .. } => Err(IngestError::invalid_spec(
                "a repository scope cannot be pulled from Confluence",
            )),
        }
    }

    async fn fetch(
        &self,
        resource: ResourceType,
        target: &Target,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchedItems> {
        let Target::Space { key, seed } = target else {
            return Err(IngestError::invalid_spec(format!(
                "Confluence cannot fetch {resource} for repository {}",
                target.label()
            )));
        };

        match resource {
            ResourceType::Space => self.fetch_space(key, seed.as_ref(), ctx).await,
            ResourceType::Page
            | ResourceType::BlogPost
            | ResourceType::Attachment
            | ResourceType::Comment => self.fetch_content(resource, key, ctx).await,
            ResourceType::Task => self.fetch_tasks(key, ctx).await,
            other => Err(IngestError::invalid_spec(format!(
                "{other} is not a Confluence resource"
            ))),
        }
    }
}
