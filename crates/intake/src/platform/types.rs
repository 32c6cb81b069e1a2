use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::sync::PullProgress;

use super::errors::{IngestError, Result};
use super::rate_limit::RateLimitState;

/// Upstream SaaS product a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    GitHub,
    Confluence,
}

impl SourceKind {
    /// Resource types in the order a pull processes them.
    #[must_use]
    pub fn resource_order(self) -> &'static [ResourceType] {
        match self {
            SourceKind::GitHub => &[
                ResourceType::Repository,
                ResourceType::Issue,
                ResourceType::PullRequest,
                ResourceType::Commit,
                ResourceType::Release,
            ],
            SourceKind::Confluence => &[
                ResourceType::Space,
                ResourceType::Page,
                ResourceType::BlogPost,
                ResourceType::Attachment,
                ResourceType::Comment,
                ResourceType::Task,
            ],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::GitHub => write!(f, "GitHub"),
            SourceKind::Confluence => write!(f, "Confluence"),
        }
    }
}

/// Kind of upstream record that becomes a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Repository,
    Issue,
    PullRequest,
    Commit,
    Release,
    Space,
    Page,
    BlogPost,
    Attachment,
    Comment,
    Task,
}

impl ResourceType {
    pub const ALL: [ResourceType; 11] = [
        ResourceType::Repository,
        ResourceType::Issue,
        ResourceType::PullRequest,
        ResourceType::Commit,
        ResourceType::Release,
        ResourceType::Space,
        ResourceType::Page,
        ResourceType::BlogPost,
        ResourceType::Attachment,
        ResourceType::Comment,
        ResourceType::Task,
    ];

    #[must_use]
    pub fn source_kind(self) -> SourceKind {
        match self {
            ResourceType::Repository
            | ResourceType::Issue
            | ResourceType::PullRequest
            | ResourceType::Commit
            | ResourceType::Release => SourceKind::GitHub,
            ResourceType::Space
            | ResourceType::Page
            | ResourceType::BlogPost
            | ResourceType::Attachment
            | ResourceType::Comment
            | ResourceType::Task => SourceKind::Confluence,
        }
    }

    /// Prefix used to build globally unique document ids.
    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            ResourceType::Repository => "repo",
            ResourceType::Issue => "issue",
            ResourceType::PullRequest => "pr",
            ResourceType::Commit => "commit",
            ResourceType::Release => "release",
            ResourceType::Space => "space",
            ResourceType::Page => "page",
            ResourceType::BlogPost => "blog",
            ResourceType::Attachment => "attachment",
            ResourceType::Comment => "comment",
            ResourceType::Task => "task",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Repository => "repositories",
            ResourceType::Issue => "issues",
            ResourceType::PullRequest => "pull_requests",
            ResourceType::Commit => "commits",
            ResourceType::Release => "releases",
            ResourceType::Space => "spaces",
            ResourceType::Page => "pages",
            ResourceType::BlogPost => "blog_posts",
            ResourceType::Attachment => "attachments",
            ResourceType::Comment => "comments",
            ResourceType::Task => "tasks",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let parsed = match normalized.as_str() {
            "repositories" | "repository" | "repos" | "repo" => ResourceType::Repository,
            "issues" | "issue" => ResourceType::Issue,
            "pull_requests" | "pull_request" | "pulls" | "prs" | "pr" => ResourceType::PullRequest,
            "commits" | "commit" => ResourceType::Commit,
            "releases" | "release" => ResourceType::Release,
            "spaces" | "space" => ResourceType::Space,
            "pages" | "page" => ResourceType::Page,
            "blog_posts" | "blog_post" | "blogposts" | "blogpost" | "blogs" | "blog" => {
                ResourceType::BlogPost
            }
            "attachments" | "attachment" => ResourceType::Attachment,
            "comments" | "comment" => ResourceType::Comment,
            "tasks" | "task" => ResourceType::Task,
            _ => {
                return Err(IngestError::invalid_spec(format!(
                    "unknown resource type '{s}'"
                )));
            }
        };
        Ok(parsed)
    }
}

/// An `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(IngestError::invalid_spec(format!(
                "expected owner/name, got '{s}'"
            ))),
        }
    }
}

/// What a pull covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// A single repository, or every repository of an owner.
    Owner { owner: String, repo: Option<String> },
    /// An explicit list of repositories.
    Repositories { repos: Vec<RepoRef> },
    /// A single space, or every space visible to the credentials.
    Space { key: Option<String> },
}

impl Scope {
    #[must_use]
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Scope::Owner { .. } | Scope::Repositories { .. } => SourceKind::GitHub,
            Scope::Space { .. } => SourceKind::Confluence,
        }
    }
}

/// A concrete upstream container that resource fetches run against.
///
/// `seed` carries the raw listing entry when scope resolution already fetched
/// it, so the container itself is not requested twice.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Repository {
        repo: RepoRef,
        seed: Option<serde_json::Value>,
    },
    Space {
        key: String,
        seed: Option<serde_json::Value>,
    },
}

impl Target {
    pub fn repository(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Target::Repository {
            repo: RepoRef::new(owner, name),
            seed: None,
        }
    }

    pub fn space(key: impl Into<String>) -> Self {
        Target::Space {
            key: key.into(),
            seed: None,
        }
    }

    /// Human-readable label used in logs and reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Target::Repository { repo, .. } => repo.full_name(),
            Target::Space { key, .. } => key.clone(),
        }
    }

    #[must_use]
    pub fn seed(&self) -> Option<&serde_json::Value> {
        match self {
            Target::Repository { seed, .. } | Target::Space { seed, .. } => seed.as_ref(),
        }
    }
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(PullProgress) + Send + Sync>;

/// Per-pull parameters handed to every fetch.
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    /// Only items changed after this instant are wanted.
    pub since: Option<DateTime<Utc>>,
    /// No new upstream call starts after this instant.
    pub deadline: Option<DateTime<Utc>>,
    pub on_progress: Option<&'a ProgressCallback>,
}

impl<'a> FetchContext<'a> {
    #[must_use]
    pub fn new(since: Option<DateTime<Utc>>) -> Self {
        Self {
            since,
            deadline: None,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<&'a ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// True when `timestamp` is strictly after `since` (or no `since` is set).
    #[must_use]
    pub fn is_newer(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        match (self.since, timestamp) {
            (None, _) => true,
            (Some(since), Some(ts)) => ts > since,
            (Some(_), None) => false,
        }
    }
}

/// Raw items returned by one fetch of one resource type for one target.
#[derive(Debug, Default)]
pub struct FetchedItems {
    pub items: Vec<serde_json::Value>,
    /// More items existed upstream but the page cap, the deadline or a failed
    /// page stopped the walk.
    pub truncated: bool,
    pub pages: u32,
    /// A page after the first failed; `items` holds what came before it.
    pub failure: Option<IngestError>,
}

impl FetchedItems {
    #[must_use]
    pub fn single(item: serde_json::Value) -> Self {
        Self {
            items: vec![item],
            truncated: false,
            pages: 1,
            failure: None,
        }
    }
}

/// Rate limit information reported by an upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Maximum requests allowed in the current window.
    pub limit: usize,
    /// Requests remaining in the current window.
    pub remaining: usize,
    /// When the window resets.
    pub reset_at: DateTime<Utc>,
}

/// Normalized author of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Login, username or account id.
    pub id: String,
    /// Display name, falling back to `id`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The uniform record every upstream item is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Type-prefixed id, unique within a batch.
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub title: String,
    pub description: String,
    /// Never absent: falls back to the title, then to an empty string.
    pub content: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub author: Author,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Upstream client trait implemented once per SaaS product.
///
/// The pull orchestrator drives any implementation through the same
/// validate → refresh → resolve → fetch cycle.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Which product this client talks to.
    fn source_kind(&self) -> SourceKind;

    /// Shared rate-limit handle for this account.
    fn rate_limit(&self) -> &RateLimitState;

    /// Clock used for deadlines and backoff.
    fn clock(&self) -> Arc<dyn Clock>;

    /// Resource types this client can fetch.
    fn supported_types(&self) -> &'static [ResourceType] {
        self.source_kind().resource_order()
    }

    /// Query the upstream's dedicated rate-limit endpoint, if it has one.
    async fn fetch_rate_limit(&self) -> Result<Option<RateLimitInfo>>;

    /// Refresh the shared rate-limit state.
    ///
    /// Never fails: on error the stale state is logged and returned.
    async fn refresh_rate_limit(&self) -> RateLimitInfo {
        match self.fetch_rate_limit().await {
            Ok(Some(info)) => {
                self.rate_limit().update(info.clone());
                info
            }
            Ok(None) => self.rate_limit().snapshot(),
            Err(e) => {
                tracing::warn!(
                    source = %self.source_kind(),
                    error = %e,
                    "rate limit refresh failed, continuing with stale state"
                );
                self.rate_limit().snapshot()
            }
        }
    }

    /// Expand a scope into the targets fetches run against.
    async fn resolve_targets(&self, scope: &Scope, ctx: &FetchContext<'_>) -> Result<Vec<Target>>;

    /// Fetch the raw items of one resource type for one target.
    async fn fetch(
        &self,
        resource: ResourceType,
        target: &Target,
        ctx: &FetchContext<'_>,
    ) -> Result<FetchedItems>;
}
