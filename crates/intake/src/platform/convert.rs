//! Shared helpers for turning raw upstream JSON into [`Document`]s.
//!
//! Every helper is total: missing or mistyped fields produce a fallback, never
//! an error.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::sync::DESCRIPTION_EXCERPT_CHARS;

use super::types::{Author, Document, ResourceType};

/// Normalize one raw upstream item.
///
/// Dispatches to the per-source converters. A source compiled out by feature
/// flags falls back to a generic conversion.
pub fn normalize(resource: ResourceType, raw: &Value) -> Document {
    match resource {
        #[cfg(feature = "github")]
        ResourceType::Repository => crate::github::convert::repository(raw),
        #[cfg(feature = "github")]
        ResourceType::Issue => crate::github::convert::issue(raw),
        #[cfg(feature = "github")]
        ResourceType::PullRequest => crate::github::convert::pull_request(raw),
        #[cfg(feature = "github")]
        ResourceType::Commit => crate::github::convert::commit(raw),
        #[cfg(feature = "github")]
        ResourceType::Release => crate::github::convert::release(raw),
        #[cfg(feature = "confluence")]
        ResourceType::Space => crate::confluence::convert::space(raw),
        #[cfg(feature = "confluence")]
        ResourceType::Page | ResourceType::BlogPost => {
            crate::confluence::convert::content(resource, raw)
        }
        #[cfg(feature = "confluence")]
        ResourceType::Attachment => crate::confluence::convert::attachment(raw),
        #[cfg(feature = "confluence")]
        ResourceType::Comment => crate::confluence::convert::comment(raw),
        #[cfg(feature = "confluence")]
        ResourceType::Task => crate::confluence::convert::task(raw),
        #[allow(unreachable_patterns)]
        _ => generic(resource, raw),
    }
}

/// Conversion that only relies on commonly named fields.
pub fn generic(resource: ResourceType, raw: &Value) -> Document {
    let title = str_at(raw, &["/title", "/name"]).unwrap_or_default();
    let body = str_at(raw, &["/body", "/description"]);
    Document {
        id: document_id(resource, raw, &["/id", "/key"]),
        resource_type: resource,
        description: describe(body.as_deref(), None, || {
            format!("{} {}", resource.id_prefix(), title)
        }),
        content: content_or_title(body, &title),
        title,
        url: str_at(raw, &["/html_url", "/url"]).unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/created_at"]), time_at(raw, &["/updated_at"])),
        updated_at: time_at(raw, &["/updated_at"]),
        author: Author::default(),
        extra: Map::new(),
    }
}

/// First non-empty string (or number rendered as string) among JSON pointers.
pub fn str_at(raw: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match raw.pointer(p) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First parseable timestamp among JSON pointers.
pub fn time_at(raw: &Value, pointers: &[&str]) -> Option<DateTime<Utc>> {
    pointers
        .iter()
        .find_map(|p| raw.pointer(p).and_then(parse_timestamp))
}

/// Parse RFC 3339 strings, or unix timestamps in seconds or milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| s.trim().parse::<i64>().ok().and_then(from_unix)),
        Value::Number(n) => n.as_i64().and_then(from_unix),
        _ => None,
    }
}

fn from_unix(value: i64) -> Option<DateTime<Utc>> {
    // Values past year 5138 in seconds are treated as milliseconds.
    if value.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// `created_at`, else `updated_at`, else the unix epoch.
pub fn created_or_epoch(
    created: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    created.or(updated).unwrap_or_default()
}

/// `"{prefix}-{id}"` from the first identifier found, else a stable hash of the
/// raw item.
pub fn document_id(resource: ResourceType, raw: &Value, pointers: &[&str]) -> String {
    let prefix = resource.id_prefix();
    match str_at(raw, pointers) {
        Some(id) => format!("{prefix}-{id}"),
        None => format!("{prefix}-{}", content_hash(raw)),
    }
}

/// First 16 hex characters of the SHA-256 of the item's JSON text.
pub fn content_hash(raw: &Value) -> String {
    let digest = Sha256::digest(raw.to_string().as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Body if non-empty, else title, else empty.
pub fn content_or_title(body: Option<String>, title: &str) -> String {
    match body {
        Some(body) if !body.trim().is_empty() => body,
        _ => title.to_string(),
    }
}

/// Excerpt of a long body, else the short description, else a synthesized
/// sentence.
pub fn describe(
    body: Option<&str>,
    short: Option<String>,
    synthesize: impl FnOnce() -> String,
) -> String {
    if let Some(body) = body.map(str::trim)
        && !body.is_empty()
    {
        return excerpt(body, DESCRIPTION_EXCERPT_CHARS);
    }
    match short {
        Some(short) if !short.trim().is_empty() => short.trim().to_string(),
        _ => synthesize(),
    }
}

/// Whitespace-collapsed prefix of `text`, at most `max_chars` characters plus
/// an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", collapsed[..idx].trim_end()),
        None => collapsed,
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a user object (or a bare account-id string).
///
/// Tolerates any missing field: `id` falls back to the display name, the
/// display name falls back to `id`, and both fall back to `"unknown"`.
pub fn author(value: Option<&Value>) -> Author {
    let Some(value) = value else {
        return unknown_author();
    };
    if let Value::String(account) = value {
        if account.trim().is_empty() {
            return unknown_author();
        }
        return Author {
            id: account.clone(),
            name: account.clone(),
            email: None,
            url: None,
        };
    }

    let id = str_at(
        value,
        &["/login", "/username", "/accountId", "/account_id", "/id"],
    );
    let name = str_at(value, &["/displayName", "/publicName", "/name"]);
    let (id, name) = match (id, name) {
        (Some(id), Some(name)) => (id, name),
        (Some(id), None) => (id.clone(), id),
        (None, Some(name)) => (name.clone(), name),
        (None, None) => return unknown_author(),
    };
    Author {
        id,
        name,
        email: str_at(value, &["/email"]),
        url: str_at(value, &["/html_url", "/_links/self"]),
    }
}

fn unknown_author() -> Author {
    Author {
        id: "unknown".to_string(),
        name: "unknown".to_string(),
        email: None,
        url: None,
    }
}

/// String values of `field` in each object of the array at `pointer`.
pub fn names_at(raw: &Value, pointer: &str, field: &str) -> Vec<String> {
    raw.pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other => other.get(field).and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build an `extra` map, dropping null values.
pub fn extra<I>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    fields
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), strip_null_values(v)))
        .collect()
}

/// Attach fetch context (owning repository, space key, link base) to a raw
/// item. Non-object items are left alone.
pub fn annotate(raw: &mut Value, key: &str, value: impl Into<Value>) {
    if let Value::Object(map) = raw {
        map.insert(key.to_string(), value.into());
    }
}

/// Value at a pointer, or null.
pub fn at(raw: &Value, pointer: &str) -> Value {
    raw.pointer(pointer).cloned().unwrap_or(Value::Null)
}

/// Strip null values from a JSON value, recursively.
pub fn strip_null_values(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let filtered: Map<String, Value> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_null_values(v)))
                .collect();
            Value::Object(filtered)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(strip_null_values).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        assert_eq!(parse_timestamp(&json!("2024-02-03T04:05:06Z")), Some(expected));
        assert_eq!(
            parse_timestamp(&json!("2024-02-03T05:05:06.000+01:00")),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!(expected.timestamp())), Some(expected));
        assert_eq!(
            parse_timestamp(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_timestamp(&Value::Null), None);
    }

    #[test]
    fn test_document_id_falls_back_to_stable_hash() {
        let raw = json!({"title": "untitled"});
        let first = document_id(ResourceType::Page, &raw, &["/id"]);
        let second = document_id(ResourceType::Page, &raw, &["/id"]);
        assert_eq!(first, second);
        assert!(first.starts_with("page-"));
        assert_eq!(first.len(), "page-".len() + 16);

        assert_eq!(
            document_id(ResourceType::Issue, &json!({"id": 42}), &["/id"]),
            "issue-42"
        );
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let text = "é".repeat(600);
        let cut = excerpt(&text, 500);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 503);
        assert_eq!(excerpt("  short   text ", 500), "short text");
    }

    #[test]
    fn test_describe_fallback_chain() {
        assert_eq!(describe(Some("body"), Some("short".into()), || "synth".into()), "body");
        assert_eq!(describe(Some("   "), Some("short".into()), || "synth".into()), "short");
        assert_eq!(describe(None, None, || "synth".into()), "synth");
    }

    #[test]
    fn test_content_or_title() {
        assert_eq!(content_or_title(Some("body".into()), "t"), "body");
        assert_eq!(content_or_title(Some(" ".into()), "t"), "t");
        assert_eq!(content_or_title(None, ""), "");
    }

    #[test]
    fn test_author_tolerates_missing_fields() {
        let full = author(Some(&json!({
            "login": "octocat",
            "html_url": "https://github.com/octocat",
            "email": "octo@example.com"
        })));
        assert_eq!(full.id, "octocat");
        assert_eq!(full.name, "octocat");
        assert_eq!(full.email.as_deref(), Some("octo@example.com"));
        assert_eq!(full.url.as_deref(), Some("https://github.com/octocat"));

        let confluence = author(Some(&json!({"accountId": "557058:abc", "displayName": "Ada"})));
        assert_eq!(confluence.id, "557058:abc");
        assert_eq!(confluence.name, "Ada");

        let bare = author(Some(&json!("557058:xyz")));
        assert_eq!(bare.id, "557058:xyz");

        assert_eq!(author(None).id, "unknown");
        assert_eq!(author(Some(&json!({}))).name, "unknown");
    }

    #[test]
    fn test_strip_null_values_nested() {
        let value = json!({"a": 1, "b": null, "c": {"d": null, "e": [null, {"f": null}]}});
        assert_eq!(
            strip_null_values(value),
            json!({"a": 1, "c": {"e": [null, {}]}})
        );
    }

    #[test]
    fn test_extra_drops_nulls_and_names_at_reads_arrays() {
        let raw = json!({"labels": [{"name": "bug"}, {"name": "p1"}], "topics": ["rust"]});
        assert_eq!(names_at(&raw, "/labels", "name"), vec!["bug", "p1"]);
        assert_eq!(names_at(&raw, "/topics", "name"), vec!["rust"]);
        assert!(names_at(&raw, "/missing", "name").is_empty());

        let map = extra([("keep", json!(1)), ("drop", Value::Null)]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_generic_never_fails_on_empty_input() {
        let doc = generic(ResourceType::Issue, &json!({}));
        assert!(doc.id.starts_with("issue-"));
        assert_eq!(doc.content, "");
        assert_eq!(doc.created_at, DateTime::<Utc>::default());
    }
}
