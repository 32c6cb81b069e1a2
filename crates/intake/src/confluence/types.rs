//! Confluence REST v1 constants and query builders.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};

use crate::platform::ResourceType;

/// REST v1 root, relative to the site URL.
pub const API_PREFIX: &str = "/wiki/rest/api";

/// Key under which fetchers record the owning space on raw items.
pub const SPACE_KEY: &str = "_space";

/// Key under which fetchers record the web base URL on raw items.
pub const BASE_KEY: &str = "_base";

/// Content type name used in CQL for a resource type.
pub fn content_type(resource: ResourceType) -> Option<&'static str> {
    match resource {
        ResourceType::Page => Some("page"),
        ResourceType::BlogPost => Some("blogpost"),
        ResourceType::Attachment => Some("attachment"),
        ResourceType::Comment => Some("comment"),
        _ => None,
    }
}

/// `expand` parameter for a content search.
pub fn content_expand(resource: ResourceType) -> &'static str {
    match resource {
        ResourceType::Attachment => "version,history,container,space,metadata",
        ResourceType::Comment => "body.storage,version,history,container,space",
        _ => "body.storage,version,history,history.lastUpdated,metadata.labels,ancestors,space",
    }
}

/// Build the CQL for one content type in one space.
///
/// CQL dates have minute granularity, so `since` is floored to the minute and
/// compared inclusively; callers filter the exact instant client-side.
pub fn content_cql(kind: &str, space_key: &str, since: Option<DateTime<Utc>>) -> String {
    let mut cql = format!("type={kind} AND space=\"{}\"", escape_cql(space_key));
    if let Some(since) = since {
        let floored = since
            .duration_trunc(TimeDelta::minutes(1))
            .unwrap_or(since);
        cql.push_str(&format!(
            " AND lastmodified >= \"{}\"",
            floored.format("%Y-%m-%d %H:%M")
        ));
    }
    cql.push_str(" ORDER BY lastmodified DESC");
    cql
}

fn escape_cql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// RFC 3339 rendering used in log lines.
pub fn display_since(since: Option<DateTime<Utc>>) -> String {
    since
        .map(|s| s.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "beginning".to_string())
}
