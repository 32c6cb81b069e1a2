//! GitHub REST client and resource fetchers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::http::HttpTransport;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::platform::convert::{annotate, time_at};
use crate::platform::paginate::collect_pages;
use crate::platform::{
    ApiSession, ClientOptions, FetchContext, FetchedItems, IngestError, PageRequest, PageStyle,
    RateLimitInfo, RateLimitState, RepoRef, ResourceType, Result, Scope, SourceClient, SourceKind,
    Target, Visit,
};
use crate::sync::FetchLimits;

use super::types::{DEFAULT_API_URL, GitHubRateLimitResponse, RAW_MEDIA_TYPE};

/// Key under which fetchers record the owning repository on raw items.
pub const REPOSITORY_KEY: &str = "_repository";

/// Default HTTP timeout for a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub client speaking the REST v3 API with bearer auth.
pub struct GitHubClient {
    session: ApiSession,
    limits: FetchLimits,
}

impl GitHubClient {
    /// Create a client against `api.github.com` with a reqwest transport.
    pub fn new(token: &str, options: ClientOptions) -> Result<Self> {
        Self::with_api_url(token, DEFAULT_API_URL, options)
    }

    /// Create a client against a custom API root (GitHub Enterprise).
    pub fn with_api_url(token: &str, api_url: &str, options: ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(REQUEST_TIMEOUT)
            .map_err(|e| IngestError::Config(e.to_string()))?;
        Self::new_with_transport(token, api_url, options, Arc::new(transport), Arc::new(SystemClock))
    }

    /// Create a client with an explicit transport and clock.
    pub fn new_with_transport(
        token: &str,
        api_url: &str,
        options: ClientOptions,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IngestError::auth("GitHub token is missing"));
        }
        if api_url.trim().is_empty() {
            return Err(IngestError::Config("GitHub API URL is empty".to_string()));
        }

        let limits = options.fetch.clone();
        let session = ApiSession::new(
            transport,
            api_url,
            format!("Bearer {token}"),
            &options,
            clock,
        );
        Ok(Self { session, limits })
    }

    /// Full rate limit breakdown from `GET /rate_limit`.
    pub async fn get_rate_limits(&self) -> Result<GitHubRateLimitResponse> {
        let url = self.session.url("/rate_limit");
        let page = self.session.get_json_once("GET /rate_limit", &url).await?;
        serde_json::from_value(page.body).map_err(|e| IngestError::Decode {
            label: "GET /rate_limit".to_string(),
            message: e.to_string(),
        })
    }

    /// Raw README text, or `None` when the repository has none.
    pub async fn fetch_readme(&self, repo: &RepoRef, ctx: &FetchContext<'_>) -> Result<Option<String>> {
        let path = format!("/repos/{}/readme", repo.full_name());
        let url = self.session.url(&path);
        self.session
            .get_optional_text(&format!("GET {path}"), &url, RAW_MEDIA_TYPE, ctx)
            .await
    }

    fn page_request(&self, page_size: u32, max_items: Option<usize>) -> PageRequest {
        PageRequest {
            style: PageStyle::Numbered,
            page_size,
            max_pages: self.limits.max_pages,
            max_items,
        }
    }

    fn since_param(ctx: &FetchContext<'_>) -> String {
        ctx.since
            .map(|since| format!("&since={}", since.to_rfc3339_opts(SecondsFormat::Secs, true)))
            .unwrap_or_default()
    }

    async fn fetch_repository(
        &self,
        repo: &RepoRef,
        seed: Option<&Value>,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchedItems> {
        let mut raw = match seed {
            Some(seed) => seed.clone(),
            None => {
                let path = format!("/repos/{}", repo.full_name());
                self.session
                    .get_json(&format!("GET {path}"), &self.session.url(&path), ctx)
                    .await?
                    .body
            }
        };

        if !ctx.is_newer(time_at(&raw, &["/updated_at"])) {
            return Ok(FetchedItems {
                pages: 1,
                ..FetchedItems::default()
            });
        }

        let mut truncated = false;
        if ctx.is_expired(self.session.clock().now()) {
            truncated = true;
        } else {
            match self.fetch_readme(repo, ctx).await {
                Ok(Some(readme)) => annotate(&mut raw, "readme", readme),
                Ok(None) => {}
                // The repository document stands without its README.
                Err(e) => {
                    tracing::warn!(repo = %repo.full_name(), error = %e, "README lookup failed, skipping it");
                    annotate(&mut raw, "readme_error", e.to_string());
                }
            }
        }
        annotate(&mut raw, REPOSITORY_KEY, repo.full_name());

        Ok(FetchedItems {
            items: vec![raw],
            truncated,
            pages: 1,
            failure: None,
        })
    }

    async fn fetch_issues(&self, repo: &RepoRef, ctx: &FetchContext<'_>) -> Result<FetchedItems> {
        let full_name = repo.full_name();
        let url = self.session.url(&format!(
            "/repos/{full_name}/issues?state=all&sort=updated&direction=desc{}",
            Self::since_param(ctx)
        ));
        collect_pages(
            &self.session,
            ResourceType::Issue,
            &full_name,
            &url,
            self.page_request(self.limits.page_size, None),
            ctx,
            |row, _| {
                // The issues endpoint also lists pull requests.
                if row.get("pull_request").is_some() {
                    return Visit::Skip;
                }
                if !ctx.is_newer(time_at(row, &["/updated_at"])) {
                    return Visit::Skip;
                }
                annotate(row, REPOSITORY_KEY, full_name.as_str());
                Visit::Keep
            },
        )
        .await
    }

    async fn fetch_pull_requests(&self, repo: &RepoRef, ctx: &FetchContext<'_>) -> Result<FetchedItems> {
        let full_name = repo.full_name();
        let url = self.session.url(&format!(
            "/repos/{full_name}/pulls?state=all&sort=updated&direction=desc"
        ));
        collect_pages(
            &self.session,
            ResourceType::PullRequest,
            &full_name,
            &url,
            self.page_request(self.limits.page_size, None),
            ctx,
            |row, _| {
                // Sorted newest first: the first item at or before `since`
                // ends the walk.
                if !ctx.is_newer(time_at(row, &["/updated_at"])) {
                    return Visit::Stop;
                }
                annotate(row, REPOSITORY_KEY, full_name.as_str());
                Visit::Keep
            },
        )
        .await
    }

    async fn fetch_commits(&self, repo: &RepoRef, ctx: &FetchContext<'_>) -> Result<FetchedItems> {
        let full_name = repo.full_name();
        let url = self.session.url(&format!(
            "/repos/{full_name}/commits?{}",
            Self::since_param(ctx).trim_start_matches('&')
        ));
        let cap = self.limits.commit_cap;
        let page_size = self.limits.page_size.min(cap.max(1) as u32);
        let result = collect_pages(
            &self.session,
            ResourceType::Commit,
            &full_name,
            url.trim_end_matches('?'),
            self.page_request(page_size, Some(cap)),
            ctx,
            |row, _| {
                annotate(row, REPOSITORY_KEY, full_name.as_str());
                Visit::Keep
            },
        )
        .await;

        match result {
            // 409 Conflict: the repository is empty.
            Err(IngestError::NonRetryable {
                status: Some(409), ..
            }) => {
                tracing::debug!(repo = %full_name, "repository is empty, no commits");
                Ok(FetchedItems::default())
            }
            other => other,
        }
    }

    async fn fetch_releases(&self, repo: &RepoRef, ctx: &FetchContext<'_>) -> Result<FetchedItems> {
        let full_name = repo.full_name();
        let url = self.session.url(&format!("/repos/{full_name}/releases"));
        collect_pages(
            &self.session,
            ResourceType::Release,
            &full_name,
            &url,
            self.page_request(self.limits.page_size, None),
            ctx,
            |row, _| {
                if !ctx.is_newer(time_at(row, &["/published_at", "/created_at"])) {
                    return Visit::Skip;
                }
                annotate(row, REPOSITORY_KEY, full_name.as_str());
                Visit::Keep
            },
        )
        .await
    }

    async fn list_owner_repos(&self, owner: &str, ctx: &FetchContext<'_>) -> Result<Vec<Target>> {
        let url = self
            .session
            .url(&format!("/users/{owner}/repos?sort=updated&direction=desc"));
        let fetched = collect_pages(
            &self.session,
            ResourceType::Repository,
            owner,
            &url,
            self.page_request(self.limits.page_size, None),
            ctx,
            |_, _| Visit::Keep,
        )
        .await?;
        if let Some(e) = &fetched.failure {
            tracing::warn!(owner, listed = fetched.items.len(), error = %e, "repository listing incomplete");
        }

        Ok(fetched
            .items
            .into_iter()
            .filter_map(|row| {
                let name = row.get("name")?.as_str()?.to_string();
                let repo_owner = row
                    .pointer("/owner/login")
                    .and_then(Value::as_str)
                    .unwrap_or(owner)
                    .to_string();
                Some(Target::Repository {
                    repo: RepoRef::new(repo_owner, name),
                    seed: Some(row),
                })
            })
            .collect())
    }
}

#[async_trait]
impl SourceClient for GitHubClient {
    fn source_kind(&self) -> SourceKind {
        SourceKind::GitHub
    }

    fn rate_limit(&self) -> &RateLimitState {
        self.session.rate_limit()
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.session.clock()
    }

    async fn fetch_rate_limit(&self) -> Result<Option<RateLimitInfo>> {
        let response = self.get_rate_limits().await?;
        Ok(response.core().map(|core| core.to_info()))
    }

    async fn resolve_targets(&self, scope: &Scope, ctx: &FetchContext<'_>) -> Result<Vec<Target>> {
        match scope {
            Scope::Owner {
                owner,
                repo: Some(repo),
            } => Ok(vec![Target::repository(owner.as_str(), repo.as_str())]),
            Scope::Owner { owner, repo: None } => self.list_owner_repos(owner, ctx).await,
            Scope::Repositories { repos } => Ok(repos
                .iter()
                .map(|r| Target::Repository {
                    repo: r.clone(),
                    seed: None,
                })
                .collect()),
            Scope::Space { .. } => Err(IngestError::invalid_spec(
                "a space scope cannot be pulled from GitHub",
            )),
        }
    }

    async fn fetch(
        &self,
        resource: ResourceType,
        target: &Target,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchedItems> {
        let Target::Repository { repo, seed } = target else {
            return Err(IngestError::invalid_spec(format!(
                "GitHub cannot fetch {resource} for space {}",
                target.label()
            )));
        };

        match resource {
            ResourceType::Repository => self.fetch_repository(repo, seed.as_ref(), ctx).await,
            ResourceType::Issue => self.fetch_issues(repo, ctx).await,
            ResourceType::PullRequest => self.fetch_pull_requests(repo, ctx).await,
            ResourceType::Commit => self.fetch_commits(repo, ctx).await,
            ResourceType::Release => self.fetch_releases(repo, ctx).await,
            other => Err(IngestError::invalid_spec(format!(
                "{other} is not a GitHub resource"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::clock::ManualClock;
    use crate::http::{HttpMethod, HttpResponse, MockTransport};

    const API: &str = "https://api.github.test";

    fn client(transport: &MockTransport) -> (GitHubClient, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let client = GitHubClient::new_with_transport(
            "ghp_test",
            API,
            ClientOptions::default(),
            Arc::new(transport.clone()),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (client, clock)
    }

    #[test]
    fn test_missing_token_is_auth_error() {
        let err = GitHubClient::new_with_transport(
            "  ",
            API,
            ClientOptions::default(),
            Arc::new(MockTransport::new()),
            Arc::new(ManualClock::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, IngestError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_requests_carry_bearer_auth_and_update_budget() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/o/r"),
            HttpResponse::json(200, &json!({"id": 1, "name": "r", "updated_at": "2024-05-01T00:00:00Z"}))
                .with_header("x-ratelimit-limit", "5000")
                .with_header("x-ratelimit-remaining", "4100")
                .with_header("x-ratelimit-reset", "1717200000"),
        );
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/o/r/readme"),
            HttpResponse::text(200, "# Hello"),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Repository, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0]["readme"], "# Hello");
        assert_eq!(fetched.items[0][REPOSITORY_KEY], "o/r");

        let requests = transport.requests();
        assert_eq!(requests[0].header("authorization"), Some("Bearer ghp_test"));
        assert_eq!(requests[1].header("accept"), Some(RAW_MEDIA_TYPE));
        // header update, then one consumed call for the README
        assert_eq!(client.rate_limit().remaining(), 4099);
    }

    #[tokio::test]
    async fn test_readme_404_is_absent_with_single_request() {
        let transport = MockTransport::new();
        let url = format!("{API}/repos/o/r/readme");
        transport.push_json(&url, 404, json!({"message": "Not Found"}));
        let (client, clock) = client(&transport);

        let readme = client
            .fetch_readme(&RepoRef::new("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();

        assert_eq!(readme, None);
        assert_eq!(transport.request_count(&url), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_issues_drop_pull_request_rows_and_send_since() {
        let transport = MockTransport::new();
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        transport.push_json(
            format!(
                "{API}/repos/o/r/issues?state=all&sort=updated&direction=desc&since=2024-01-01T00:00:00Z&per_page=100&page=1"
            ),
            200,
            json!([
                {"id": 1, "number": 1, "title": "bug", "updated_at": "2024-02-01T00:00:00Z"},
                {"id": 2, "number": 2, "title": "pr", "updated_at": "2024-02-01T00:00:00Z", "pull_request": {"url": "x"}}
            ]),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Issue, &Target::repository("o", "r"), &FetchContext::new(Some(since)))
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0]["title"], "bug");
    }

    #[tokio::test]
    async fn test_pull_requests_filter_on_since_and_stop_early() {
        let transport = MockTransport::new();
        let since = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let page: Vec<Value> = std::iter::once(json!({"id": 1, "updated_at": "2024-03-11T00:00:00Z"}))
            .chain(std::iter::once(json!({"id": 2, "updated_at": "2024-03-09T00:00:00Z"})))
            .chain((3..=100).map(|id| json!({"id": id, "updated_at": "2024-01-01T00:00:00Z"})))
            .collect();
        transport.push_json(
            format!("{API}/repos/o/r/pulls?state=all&sort=updated&direction=desc&per_page=100&page=1"),
            200,
            Value::Array(page),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(
                ResourceType::PullRequest,
                &Target::repository("o", "r"),
                &FetchContext::new(Some(since)),
            )
            .await
            .unwrap();

        let ids: Vec<_> = fetched.items.iter().map(|i| i["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1]);
        // full page, but the walk stopped at the first stale item
        assert_eq!(transport.requests().len(), 1);
        assert!(!fetched.truncated);
    }

    #[tokio::test]
    async fn test_commits_are_capped() {
        let transport = MockTransport::new();
        let rows: Vec<Value> = (0..50).map(|i| json!({"sha": format!("{i:040}")})).collect();
        transport.push_json(
            format!("{API}/repos/o/r/commits?per_page=50&page=1"),
            200,
            Value::Array(rows),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Commit, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 50);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_repository_has_no_commits() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/repos/o/r/commits?per_page=50&page=1"),
            409,
            json!({"message": "Git Repository is empty."}),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Commit, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();
        assert!(fetched.items.is_empty());
    }

    #[tokio::test]
    async fn test_releases_filter_on_published_or_created() {
        let transport = MockTransport::new();
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        transport.push_json(
            format!("{API}/repos/o/r/releases?per_page=100&page=1"),
            200,
            json!([
                {"id": 1, "tag_name": "v2", "published_at": "2024-04-01T00:00:00Z"},
                {"id": 2, "tag_name": "v1", "published_at": "2024-01-01T00:00:00Z"},
                {"id": 3, "tag_name": "draft", "published_at": null, "created_at": "2024-03-02T00:00:00Z"}
            ]),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Release, &Target::repository("o", "r"), &FetchContext::new(Some(since)))
            .await
            .unwrap();

        let tags: Vec<_> = fetched.items.iter().map(|i| i["tag_name"].as_str().unwrap()).collect();
        assert_eq!(tags, vec!["v2", "draft"]);
    }

    #[tokio::test]
    async fn test_link_header_drives_pagination() {
        let transport = MockTransport::new();
        let first: Vec<Value> = (0..100)
            .map(|i| json!({"id": i, "updated_at": "2024-05-01T00:00:00Z"}))
            .collect();
        transport.push_response(
            HttpMethod::Get,
            format!("{API}/repos/o/r/issues?state=all&sort=updated&direction=desc&per_page=100&page=1"),
            HttpResponse::json(200, &Value::Array(first)).with_header(
                "Link",
                format!(r#"<{API}/repos/o/r/issues?page=2>; rel="next", <{API}/repos/o/r/issues?page=2>; rel="last""#),
            ),
        );
        transport.push_json(
            format!("{API}/repos/o/r/issues?state=all&sort=updated&direction=desc&per_page=100&page=2"),
            200,
            json!([{"id": 100, "updated_at": "2024-05-01T00:00:00Z"}]),
        );
        let (client, _) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Issue, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();
        assert_eq!(fetched.items.len(), 101);
        assert_eq!(fetched.pages, 2);
    }

    #[tokio::test]
    async fn test_page_cap_truncates_walk() {
        let transport = MockTransport::new();
        let options = ClientOptions {
            fetch: FetchLimits {
                page_size: 2,
                max_pages: 1,
                ..FetchLimits::default()
            },
            ..ClientOptions::default()
        };
        let client = GitHubClient::new_with_transport(
            "t",
            API,
            options,
            Arc::new(transport.clone()),
            Arc::new(ManualClock::default()),
        )
        .unwrap();
        transport.push_json(
            format!("{API}/repos/o/r/releases?per_page=2&page=1"),
            200,
            json!([{"id": 1}, {"id": 2}]),
        );

        let fetched = client
            .fetch(ResourceType::Release, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();
        assert_eq!(fetched.items.len(), 2);
        assert!(fetched.truncated);
    }

    #[tokio::test]
    async fn test_failed_later_page_keeps_earlier_items() {
        let transport = MockTransport::new();
        let options = ClientOptions {
            fetch: FetchLimits {
                page_size: 2,
                ..FetchLimits::default()
            },
            ..ClientOptions::default()
        };
        let client = GitHubClient::new_with_transport(
            "t",
            API,
            options,
            Arc::new(transport.clone()),
            Arc::new(ManualClock::default()),
        )
        .unwrap();
        transport.push_json(
            format!("{API}/repos/o/r/releases?per_page=2&page=1"),
            200,
            json!([{"id": 1}, {"id": 2}]),
        );
        transport.push_json(
            format!("{API}/repos/o/r/releases?per_page=2&page=2"),
            400,
            json!({"message": "bad"}),
        );

        let fetched = client
            .fetch(ResourceType::Release, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();

        let ids: Vec<_> = fetched.items.iter().map(|item| item["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2)]);
        assert!(fetched.truncated);
        assert_eq!(fetched.pages, 1);
        assert!(matches!(
            fetched.failure,
            Some(IngestError::NonRetryable {
                status: Some(400),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_failed_first_page_is_an_error() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/repos/o/r/releases?per_page=100&page=1"),
            400,
            json!({"message": "bad"}),
        );
        let (client, _) = client(&transport);

        let err = client
            .fetch(ResourceType::Release, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NonRetryable { .. }));
    }

    #[tokio::test]
    async fn test_readme_failure_keeps_repository() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/repos/o/r"),
            200,
            json!({"id": 1, "full_name": "o/r", "description": "A tool", "updated_at": "2024-05-01T00:00:00Z"}),
        );
        let readme_url = format!("{API}/repos/o/r/readme");
        for _ in 0..3 {
            transport.push_response(HttpMethod::Get, &readme_url, HttpResponse::text(500, "boom"));
        }
        let (client, clock) = client(&transport);

        let fetched = client
            .fetch(ResourceType::Repository, &Target::repository("o", "r"), &FetchContext::new(None))
            .await
            .unwrap();

        assert_eq!(transport.request_count(&readme_url), 3);
        assert_eq!(clock.sleeps().len(), 2);
        assert_eq!(fetched.items.len(), 1);
        assert!(fetched.failure.is_none());
        let doc = crate::platform::normalize(ResourceType::Repository, &fetched.items[0]);
        assert_eq!(doc.content, "A tool");
        assert_eq!(doc.extra["has_readme"], false);
        assert!(doc.extra["readme_error"].as_str().unwrap().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_resolve_owner_lists_repositories_with_seeds() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/users/octo/repos?sort=updated&direction=desc&per_page=100&page=1"),
            200,
            json!([
                {"id": 1, "name": "alpha", "owner": {"login": "octo"}},
                {"id": 2, "name": "beta", "owner": {"login": "octo"}}
            ]),
        );
        let (client, _) = client(&transport);

        let targets = client
            .resolve_targets(
                &Scope::Owner {
                    owner: "octo".to_string(),
                    repo: None,
                },
                &FetchContext::new(None),
            )
            .await
            .unwrap();

        let labels: Vec<_> = targets.iter().map(Target::label).collect();
        assert_eq!(labels, vec!["octo/alpha", "octo/beta"]);
        assert!(targets.iter().all(|t| t.seed().is_some()));
    }

    #[tokio::test]
    async fn test_seeded_repository_is_not_refetched_and_since_applies() {
        let transport = MockTransport::new();
        let (client, _) = client(&transport);
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let target = Target::Repository {
            repo: RepoRef::new("o", "stale"),
            seed: Some(json!({"id": 9, "name": "stale", "updated_at": "2024-01-01T00:00:00Z"})),
        };

        let fetched = client
            .fetch(ResourceType::Repository, &target, &FetchContext::new(Some(since)))
            .await
            .unwrap();
        assert!(fetched.items.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rate_limit_reads_core_budget() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/rate_limit"),
            200,
            json!({"resources": {"core": {"limit": 5000, "used": 4990, "remaining": 10, "reset": 1717243200}}}),
        );
        let (client, _) = client(&transport);

        let info = client.refresh_rate_limit().await;
        assert_eq!(info.remaining, 10);
        assert_eq!(client.rate_limit().snapshot().remaining, 10);
    }

    #[tokio::test]
    async fn test_refresh_rate_limit_failure_keeps_stale_state() {
        let transport = MockTransport::new();
        transport.push_json(format!("{API}/rate_limit"), 500, json!({"message": "boom"}));
        let (client, _) = client(&transport);
        let before = client.rate_limit().snapshot();

        let info = client.refresh_rate_limit().await;
        assert_eq!(info.limit, before.limit);
        // the failed call itself was still dispatched
        assert_eq!(info.remaining, before.remaining - 1);
    }

    #[tokio::test]
    async fn test_space_scope_is_rejected() {
        let (client, _) = client(&MockTransport::new());
        let err = client
            .resolve_targets(&Scope::Space { key: None }, &FetchContext::new(None))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidSpec(_)));
    }
}
