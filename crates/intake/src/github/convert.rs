//! GitHub items to [`Document`]s.

use serde_json::{Value, json};

use crate::platform::convert::{
    at, author, content_or_title, created_or_epoch, describe, document_id, extra, names_at, str_at,
    time_at,
};
use crate::platform::{Document, ResourceType};

/// Pointer to the owning repository recorded by the fetchers.
const REPOSITORY_POINTER: &str = "/_repository";

fn repository_name(raw: &Value) -> Option<String> {
    str_at(raw, &[REPOSITORY_POINTER, "/full_name"])
}

/// Repository, with its README as content when one was fetched.
pub fn repository(raw: &Value) -> Document {
    let full_name = str_at(raw, &["/full_name", REPOSITORY_POINTER, "/name"])
        .unwrap_or_default();
    let readme = str_at(raw, &["/readme"]);
    let description = str_at(raw, &["/description"]);
    let updated_at = time_at(raw, &["/updated_at", "/pushed_at"]);

    Document {
        id: document_id(ResourceType::Repository, raw, &["/id", "/node_id", "/full_name"]),
        resource_type: ResourceType::Repository,
        description: describe(readme.as_deref(), description.clone(), || {
            format!("Repository {full_name}")
        }),
        content: content_or_title(readme.clone().or(description), &full_name),
        title: full_name,
        url: str_at(raw, &["/html_url"]).unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/created_at"]), updated_at),
        updated_at,
        author: author(raw.get("owner")),
        extra: extra([
            ("stars", at(raw, "/stargazers_count")),
            ("forks", at(raw, "/forks_count")),
            ("watchers", at(raw, "/watchers_count")),
            ("open_issues", at(raw, "/open_issues_count")),
            ("language", at(raw, "/language")),
            ("topics", at(raw, "/topics")),
            ("default_branch", at(raw, "/default_branch")),
            ("license", at(raw, "/license/spdx_id")),
            ("homepage", at(raw, "/homepage")),
            ("visibility", at(raw, "/visibility")),
            ("is_fork", at(raw, "/fork")),
            ("is_archived", at(raw, "/archived")),
            ("pushed_at", at(raw, "/pushed_at")),
            ("has_readme", json!(readme.is_some())),
            ("readme_error", at(raw, "/readme_error")),
        ]),
    }
}

fn issue_like(resource: ResourceType, raw: &Value, noun: &str) -> Document {
    let title = str_at(raw, &["/title"]).unwrap_or_default();
    let body = str_at(raw, &["/body"]);
    let number = str_at(raw, &["/number"]);
    let repo = repository_name(raw);
    let updated_at = time_at(raw, &["/updated_at"]);

    Document {
        id: document_id(resource, raw, &["/id", "/node_id"]),
        resource_type: resource,
        description: describe(body.as_deref(), None, || match (&number, &repo) {
            (Some(n), Some(r)) => format!("{noun} #{n} in {r}: {title}"),
            (Some(n), None) => format!("{noun} #{n}: {title}"),
            _ => format!("{noun}: {title}"),
        }),
        content: content_or_title(body, &title),
        title,
        url: str_at(raw, &["/html_url"]).unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/created_at"]), updated_at),
        updated_at,
        author: author(raw.get("user")),
        extra: Default::default(),
    }
}

pub fn issue(raw: &Value) -> Document {
    let mut doc = issue_like(ResourceType::Issue, raw, "Issue");
    doc.extra = extra([
        ("number", at(raw, "/number")),
        ("state", at(raw, "/state")),
        ("state_reason", at(raw, "/state_reason")),
        ("labels", json!(names_at(raw, "/labels", "name"))),
        ("assignees", json!(names_at(raw, "/assignees", "login"))),
        ("comments", at(raw, "/comments")),
        ("milestone", at(raw, "/milestone/title")),
        ("closed_at", at(raw, "/closed_at")),
        ("repository", repository_name(raw).map(Value::from).unwrap_or(Value::Null)),
    ]);
    doc
}

pub fn pull_request(raw: &Value) -> Document {
    let mut doc = issue_like(ResourceType::PullRequest, raw, "Pull request");
    doc.extra = extra([
        ("number", at(raw, "/number")),
        ("state", at(raw, "/state")),
        ("draft", at(raw, "/draft")),
        ("merged", json!(raw.get("merged_at").is_some_and(|m| !m.is_null()))),
        ("merged_at", at(raw, "/merged_at")),
        ("closed_at", at(raw, "/closed_at")),
        ("head", at(raw, "/head/ref")),
        ("base", at(raw, "/base/ref")),
        ("labels", json!(names_at(raw, "/labels", "name"))),
        ("assignees", json!(names_at(raw, "/assignees", "login"))),
        ("reviewers", json!(names_at(raw, "/requested_reviewers", "login"))),
        ("repository", repository_name(raw).map(Value::from).unwrap_or(Value::Null)),
    ]);
    doc
}

/// Commit; the first message line is the title.
pub fn commit(raw: &Value) -> Document {
    let sha = str_at(raw, &["/sha"]).unwrap_or_default();
    let short_sha: String = sha.chars().take(7).collect();
    let message = str_at(raw, &["/commit/message"]);
    let title = message
        .as_deref()
        .and_then(|m| m.lines().next())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Commit {short_sha}"));
    let repo = repository_name(raw);
    let authored = time_at(raw, &["/commit/author/date"]);
    let committed = time_at(raw, &["/commit/committer/date"]);

    // Prefer the linked GitHub account, enriched with the git identity.
    let git_author = raw.pointer("/commit/author");
    let mut commit_author = match raw.get("author").filter(|a| !a.is_null()) {
        Some(account) => author(Some(account)),
        None => author(git_author),
    };
    if commit_author.email.is_none() {
        commit_author.email = git_author.and_then(|a| str_at(a, &["/email"]));
    }

    Document {
        id: document_id(ResourceType::Commit, raw, &["/sha", "/node_id"]),
        resource_type: ResourceType::Commit,
        description: describe(message.as_deref(), None, || match &repo {
            Some(r) => format!("Commit {short_sha} in {r}"),
            None => format!("Commit {short_sha}"),
        }),
        content: content_or_title(message, &title),
        title,
        url: str_at(raw, &["/html_url"]).unwrap_or_default(),
        created_at: created_or_epoch(authored, committed),
        updated_at: committed,
        author: commit_author,
        extra: extra([
            ("sha", json!(sha)),
            ("committer", at(raw, "/commit/committer/name")),
            ("parents", json!(names_at(raw, "/parents", "sha"))),
            ("verified", at(raw, "/commit/verification/verified")),
            ("repository", repo.map(Value::from).unwrap_or(Value::Null)),
        ]),
    }
}

pub fn release(raw: &Value) -> Document {
    let tag = str_at(raw, &["/tag_name"]);
    let title = str_at(raw, &["/name"])
        .or_else(|| tag.clone())
        .unwrap_or_default();
    let body = str_at(raw, &["/body"]);
    let repo = repository_name(raw);
    let published = time_at(raw, &["/published_at"]);

    Document {
        id: document_id(ResourceType::Release, raw, &["/id", "/node_id", "/tag_name"]),
        resource_type: ResourceType::Release,
        description: describe(body.as_deref(), None, || match (&tag, &repo) {
            (Some(t), Some(r)) => format!("Release {t} of {r}"),
            (Some(t), None) => format!("Release {t}"),
            _ => format!("Release {title}"),
        }),
        content: content_or_title(body, &title),
        title,
        url: str_at(raw, &["/html_url"]).unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/created_at"]), published),
        updated_at: published,
        author: author(raw.get("author")),
        extra: extra([
            ("tag_name", tag.map(Value::from).unwrap_or(Value::Null)),
            ("prerelease", at(raw, "/prerelease")),
            ("draft", at(raw, "/draft")),
            ("published_at", at(raw, "/published_at")),
            ("target_commitish", at(raw, "/target_commitish")),
            ("assets", json!(names_at(raw, "/assets", "name"))),
            ("repository", repo.map(Value::from).unwrap_or(Value::Null)),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_repository_uses_readme_as_content() {
        let raw = json!({
            "id": 123,
            "full_name": "rust-lang/rust",
            "description": "Empowering everyone",
            "html_url": "https://github.com/rust-lang/rust",
            "stargazers_count": 90000,
            "forks_count": 12000,
            "language": "Rust",
            "topics": ["compiler"],
            "owner": {"login": "rust-lang", "html_url": "https://github.com/rust-lang"},
            "created_at": "2010-06-16T20:39:03Z",
            "updated_at": "2024-05-01T00:00:00Z",
            "license": {"spdx_id": "Apache-2.0"},
            "readme": "# The Rust Programming Language",
        });

        let doc = repository(&raw);
        assert_eq!(doc.id, "repo-123");
        assert_eq!(doc.title, "rust-lang/rust");
        assert_eq!(doc.content, "# The Rust Programming Language");
        assert_eq!(doc.description, "# The Rust Programming Language");
        assert_eq!(doc.author.id, "rust-lang");
        assert_eq!(doc.extra["stars"], 90000);
        assert_eq!(doc.extra["license"], "Apache-2.0");
        assert_eq!(doc.extra["has_readme"], true);
    }

    #[test]
    fn test_repository_without_readme_falls_back_to_description() {
        let doc = repository(&json!({"id": 1, "full_name": "o/r", "description": "A tool"}));
        assert_eq!(doc.content, "A tool");
        assert_eq!(doc.description, "A tool");
        assert_eq!(doc.extra["has_readme"], false);
        assert!(doc.extra.get("readme_error").is_none());
        assert!(doc.extra.get("language").is_none());
    }

    #[test]
    fn test_issue_with_missing_optional_fields() {
        let raw = json!({"id": 7, "number": 3, "title": "Crash on start", "_repository": "o/r"});
        let doc = issue(&raw);
        assert_eq!(doc.id, "issue-7");
        assert_eq!(doc.content, "Crash on start");
        assert_eq!(doc.description, "Issue #3 in o/r: Crash on start");
        assert_eq!(doc.created_at, DateTime::<Utc>::default());
        assert_eq!(doc.author.id, "unknown");
        assert_eq!(doc.extra["repository"], "o/r");
    }

    #[test]
    fn test_issue_extra_fields() {
        let raw = json!({
            "id": 8,
            "number": 4,
            "title": "Feature",
            "body": "Please add X",
            "state": "open",
            "labels": [{"name": "enhancement"}],
            "assignees": [{"login": "octocat"}],
            "user": {"login": "hubot"},
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        });
        let doc = issue(&raw);
        assert_eq!(doc.description, "Please add X");
        assert_eq!(doc.extra["labels"], json!(["enhancement"]));
        assert_eq!(doc.extra["assignees"], json!(["octocat"]));
        assert_eq!(doc.author.name, "hubot");
        assert_eq!(
            doc.updated_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_pull_request_merge_state() {
        let raw = json!({
            "id": 9,
            "number": 12,
            "title": "Fix",
            "merged_at": "2024-02-01T00:00:00Z",
            "draft": false,
            "head": {"ref": "fix"},
            "base": {"ref": "main"}
        });
        let doc = pull_request(&raw);
        assert_eq!(doc.id, "pr-9");
        assert_eq!(doc.extra["merged"], true);
        assert_eq!(doc.extra["head"], "fix");
        assert_eq!(doc.extra["base"], "main");
    }

    #[test]
    fn test_commit_title_and_author_merge() {
        let raw = json!({
            "sha": "abcdef1234567890",
            "commit": {
                "message": "Fix parser\n\nLonger explanation",
                "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-01-01T00:00:00Z"},
                "committer": {"name": "GitHub", "date": "2024-01-02T00:00:00Z"}
            },
            "author": {"login": "ada"},
            "_repository": "o/r"
        });
        let doc = commit(&raw);
        assert_eq!(doc.id, "commit-abcdef1234567890");
        assert_eq!(doc.title, "Fix parser");
        assert_eq!(doc.content, "Fix parser\n\nLonger explanation");
        assert_eq!(doc.author.id, "ada");
        assert_eq!(doc.author.email.as_deref(), Some("ada@example.com"));
        assert_eq!(doc.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_commit_without_linked_account() {
        let raw = json!({
            "sha": "0123456789",
            "commit": {"message": "", "author": {"name": "Bot", "email": "bot@example.com"}},
            "author": null
        });
        let doc = commit(&raw);
        assert_eq!(doc.title, "Commit 0123456");
        assert_eq!(doc.description, "Commit 0123456");
        assert_eq!(doc.author.name, "Bot");
    }

    #[test]
    fn test_release_title_falls_back_to_tag() {
        let raw = json!({
            "id": 5,
            "tag_name": "v1.0.0",
            "name": null,
            "prerelease": false,
            "created_at": "2024-01-01T00:00:00Z",
            "published_at": "2024-01-03T00:00:00Z",
            "_repository": "o/r"
        });
        let doc = release(&raw);
        assert_eq!(doc.title, "v1.0.0");
        assert_eq!(doc.content, "v1.0.0");
        assert_eq!(doc.description, "Release v1.0.0 of o/r");
        assert_eq!(doc.extra["tag_name"], "v1.0.0");
    }
}
