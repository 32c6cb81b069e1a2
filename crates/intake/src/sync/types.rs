//! Pull request/response types and shared constants for all sources.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::{Document, ErrorKind, IngestError, ResourceType, Scope};

/// Maximum attempts (including the first) for one upstream call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed wait after a rate-limited response, in milliseconds.
pub const RATE_LIMIT_WINDOW_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds for server/network failures.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds for server/network failures.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Pages walked per target and resource type before the walk is truncated.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Commits kept per repository.
pub const DEFAULT_COMMIT_CAP: usize = 50;

/// Characters kept when a long body is excerpted into a description.
pub const DESCRIPTION_EXCERPT_CHARS: usize = 500;

/// Bounds applied to every list walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLimits {
    /// Items per page (`per_page` / `limit`).
    pub page_size: u32,
    /// Pages per walk.
    pub max_pages: u32,
    /// Commits kept per repository.
    pub commit_cap: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            commit_cap: DEFAULT_COMMIT_CAP,
        }
    }
}

/// A request to pull documents from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullSpec {
    pub scope: Scope,
    pub resource_types: BTreeSet<ResourceType>,
    /// Only items changed after this instant are pulled.
    pub since: Option<DateTime<Utc>>,
    /// Opaque cursor from a previous pull's [`ResourceCursor`]; used when
    /// `since` is absent.
    pub cursor: Option<String>,
    /// Upper bound on the whole pull. Once exceeded no new upstream call is
    /// issued and the partial batch is returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl PullSpec {
    pub fn new(scope: Scope, resource_types: impl IntoIterator<Item = ResourceType>) -> Self {
        Self {
            scope,
            resource_types: resource_types.into_iter().collect(),
            since: None,
            cursor: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The lower time bound for this pull: `since`, else the decoded cursor.
    pub fn effective_since(&self) -> Result<Option<DateTime<Utc>>, IngestError> {
        if self.since.is_some() {
            return Ok(self.since);
        }
        match self.cursor.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(cursor) => DateTime::parse_from_rfc3339(cursor)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| IngestError::invalid_spec(format!("invalid cursor '{cursor}': {e}"))),
        }
    }
}

/// Where the next pull of one resource type should resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCursor {
    pub resource_type: ResourceType,
    /// RFC 3339 timestamp, or absent for a full pull.
    pub since_or_cursor: Option<String>,
}

/// A failure recorded against one target of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFailure {
    /// Repository full name, space key, or `scope` for resolution failures.
    pub target: String,
    pub kind: Option<ErrorKind>,
    pub message: String,
}

impl TargetFailure {
    pub fn new(target: impl Into<String>, error: &IngestError) -> Self {
        Self {
            target: target.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one resource type within a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub resource_type: ResourceType,
    /// Documents added to the batch (after duplicate suppression).
    pub documents: usize,
    /// A page cap or the deadline cut at least one walk short.
    pub truncated: bool,
    /// The deadline passed before every target was fetched.
    pub skipped: bool,
    pub failures: Vec<TargetFailure>,
}

impl ResourceReport {
    #[must_use]
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            documents: 0,
            truncated: false,
            skipped: false,
            failures: Vec::new(),
        }
    }

    /// Every target was fetched without error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && !self.skipped
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Result of a pull: the batch plus per-type bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullOutcome {
    pub documents: Vec<Document>,
    /// Pass as `since` to the next pull. Never decreases across pulls on the
    /// same orchestrator.
    pub next_since: DateTime<Utc>,
    pub rate_limit_remaining: usize,
    pub resources: Vec<ResourceReport>,
    /// The pull stopped early because its timeout elapsed.
    pub deadline_reached: bool,
}

impl PullOutcome {
    /// Report for one resource type, if it was requested.
    #[must_use]
    pub fn report(&self, resource_type: ResourceType) -> Option<&ResourceReport> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type)
    }

    /// Resource types that recorded at least one failure.
    #[must_use]
    pub fn failed_types(&self) -> Vec<ResourceType> {
        self.resources
            .iter()
            .filter(|r| r.failed())
            .map(|r| r.resource_type)
            .collect()
    }

    /// Per-type resume points.
    ///
    /// Types that completed cleanly resume from `next_since`; the rest keep
    /// `previous_since` so nothing is skipped on the next pull.
    #[must_use]
    pub fn cursors(&self, previous_since: Option<DateTime<Utc>>) -> Vec<ResourceCursor> {
        self.resources
            .iter()
            .map(|report| {
                let since = if report.succeeded() {
                    Some(self.next_since)
                } else {
                    previous_since
                };
                ResourceCursor {
                    resource_type: report.resource_type,
                    since_or_cursor: since.map(|s| s.to_rfc3339()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scope() -> Scope {
        Scope::Owner {
            owner: "octo".to_string(),
            repo: Some("hello".to_string()),
        }
    }

    #[test]
    fn test_fetch_limits_default() {
        let limits = FetchLimits::default();
        assert_eq!(limits.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(limits.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(limits.commit_cap, 50);
    }

    #[test]
    fn test_effective_since_prefers_since_over_cursor() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let spec = PullSpec::new(scope(), [ResourceType::Issue])
            .since(since)
            .cursor("2023-01-01T00:00:00Z");
        assert_eq!(spec.effective_since().unwrap(), Some(since));
    }

    #[test]
    fn test_effective_since_decodes_cursor() {
        let spec = PullSpec::new(scope(), [ResourceType::Issue]).cursor("2024-03-05T10:00:00+00:00");
        assert_eq!(
            spec.effective_since().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_effective_since_rejects_garbage_cursor() {
        let spec = PullSpec::new(scope(), [ResourceType::Issue]).cursor("page-7");
        let err = spec.effective_since().unwrap_err();
        assert!(matches!(err, IngestError::InvalidSpec(_)));
    }

    #[test]
    fn test_cursors_keep_previous_since_for_failed_types() {
        let previous = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut failed = ResourceReport::new(ResourceType::Issue);
        failed.failures.push(TargetFailure {
            target: "octo/hello".to_string(),
            kind: Some(ErrorKind::ServerOrNetwork),
            message: "boom".to_string(),
        });
        let outcome = PullOutcome {
            documents: Vec::new(),
            next_since: next,
            rate_limit_remaining: 10,
            resources: vec![ResourceReport::new(ResourceType::Repository), failed],
            deadline_reached: false,
        };

        let cursors = outcome.cursors(Some(previous));
        assert_eq!(cursors[0].since_or_cursor, Some(next.to_rfc3339()));
        assert_eq!(cursors[1].since_or_cursor, Some(previous.to_rfc3339()));
        assert_eq!(outcome.failed_types(), vec![ResourceType::Issue]);
    }

    #[test]
    fn test_resource_report_default_state() {
        let report = ResourceReport::new(ResourceType::Page);
        assert!(report.succeeded());
        assert!(!report.failed());
        assert_eq!(report.documents, 0);
    }
}
