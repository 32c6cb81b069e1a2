//! List walking shared by all sources.
//!
//! A walk stops on a short page, on a missing `next` link when the upstream
//! provides links, on the page cap, on an item cap, or when the pull deadline
//! passes.

use serde_json::Value;
use url::Url;

use crate::http::header_get;
use crate::sync::{PullProgress, emit};

use super::errors::{IngestError, Result};
use super::session::{ApiSession, JsonPage};
use super::types::{FetchContext, FetchedItems, ResourceType};

/// How an upstream numbers its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// `per_page=N&page=P`, 1-indexed (GitHub).
    Numbered,
    /// `limit=N&start=OFFSET` (Confluence).
    Offset,
}

/// Bounds for one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub style: PageStyle,
    pub page_size: u32,
    pub max_pages: u32,
    /// Stop once this many items were kept.
    pub max_items: Option<usize>,
}

/// What to do with one listed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Skip,
    /// Skip this item and stop the walk after it.
    Stop,
}

/// Parsed Link header information for pagination.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkPagination {
    /// URL of the next page, if any.
    pub next: Option<String>,
    /// Last page number, if provided.
    pub last_page: Option<u32>,
}

/// Parse an RFC 8288 `Link` header.
///
/// Format: `<https://api.github.com/...?page=2>; rel="next", <...?page=5>; rel="last"`
pub fn parse_link_header(header: &str) -> LinkPagination {
    let mut pagination = LinkPagination::default();

    for part in header.split(',') {
        let mut sections = part.split(';');
        let Some(url_part) = sections.next() else {
            continue;
        };
        let url = url_part.trim().trim_start_matches('<').trim_end_matches('>');

        for param in sections {
            let param = param.trim();
            if param == "rel=\"next\"" {
                pagination.next = Some(url.to_string());
            } else if param == "rel=\"last\"" {
                pagination.last_page = extract_page_from_url(url);
            }
        }
    }

    pagination
}

/// Extract the `page` query parameter from a URL.
fn extract_page_from_url(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
}

/// Accept both bare arrays and `{results: [...]}` / `{items: [...]}` envelopes.
pub fn unwrap_envelope(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["results", "items", "values"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Whether the upstream's links say another page exists.
///
/// `None` when the response carries no links at all (a GitHub `Link` header
/// or a Confluence `_links` object).
fn linked_next(page: &JsonPage) -> Option<bool> {
    if let Some(link) = header_get(&page.headers, "link") {
        return Some(parse_link_header(link).next.is_some());
    }
    page.body
        .get("_links")
        .and_then(Value::as_object)
        .map(|links| links.get("next").is_some_and(|next| !next.is_null()))
}

fn page_url(base: &Url, request: &PageRequest, page: u32) -> String {
    let mut url = base.clone();
    {
        let mut query = url.query_pairs_mut();
        match request.style {
            PageStyle::Numbered => {
                query
                    .append_pair("per_page", &request.page_size.to_string())
                    .append_pair("page", &page.to_string());
            }
            PageStyle::Offset => {
                let start = (page - 1) * request.page_size;
                query
                    .append_pair("limit", &request.page_size.to_string())
                    .append_pair("start", &start.to_string());
            }
        }
    }
    url.to_string()
}

/// Walk a list endpoint, keeping the items `visit` accepts.
///
/// `visit` also receives the page body so callers can copy page-level data
/// (such as Confluence's `_links.base`) onto each item.
///
/// A failure on the first page is returned as an error. A failure on a later
/// page ends the walk: the items kept so far come back truncated, with the
/// error in [`FetchedItems::failure`].
#[allow(clippy::too_many_arguments)]
pub async fn collect_pages<V>(
    session: &ApiSession,
    resource: ResourceType,
    target: &str,
    base_url: &str,
    request: PageRequest,
    ctx: &FetchContext<'_>,
    mut visit: V,
) -> Result<FetchedItems>
where
    V: FnMut(&mut Value, &Value) -> Visit + Send,
{
    let base = Url::parse(base_url)
        .map_err(|e| IngestError::Config(format!("invalid URL {base_url}: {e}")))?;
    let clock = session.clock();
    let mut fetched = FetchedItems::default();
    let mut page: u32 = 1;

    loop {
        if ctx.is_expired(clock.now()) {
            tracing::debug!(%resource, target, page, "deadline reached, truncating walk");
            fetched.truncated = true;
            break;
        }

        let url = page_url(&base, &request, page);
        let label = format!("GET {resource} for {target} (page {page})");
        let response = match session.get_json(&label, &url, ctx).await {
            Ok(response) => response,
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                tracing::warn!(
                    %resource,
                    target,
                    page,
                    kept = fetched.items.len(),
                    error = %e,
                    "page failed, keeping earlier pages"
                );
                fetched.truncated = true;
                fetched.failure = Some(e);
                break;
            }
        };
        fetched.pages = page;

        let linked = linked_next(&response);
        let page_meta = strip_items(&response.body);
        let rows = unwrap_envelope(response.body);
        let count = rows.len();
        let more = linked.unwrap_or(count >= request.page_size as usize);

        let mut stop = false;
        for mut row in rows {
            match visit(&mut row, &page_meta) {
                Visit::Keep => {
                    fetched.items.push(row);
                    if request
                        .max_items
                        .is_some_and(|cap| fetched.items.len() >= cap)
                    {
                        stop = true;
                        break;
                    }
                }
                Visit::Skip => {}
                Visit::Stop => {
                    stop = true;
                    break;
                }
            }
        }

        tracing::debug!(
            %resource,
            target,
            page,
            count,
            kept = fetched.items.len(),
            "fetched page"
        );
        emit(
            ctx.on_progress,
            PullProgress::FetchedPage {
                resource,
                target: target.to_string(),
                page,
                count,
                total_so_far: fetched.items.len(),
            },
        );

        if stop || !more || count < request.page_size as usize {
            break;
        }
        if page >= request.max_pages {
            tracing::debug!(%resource, target, page, "page cap reached, truncating walk");
            fetched.truncated = true;
            break;
        }
        page += 1;
    }

    Ok(fetched)
}

/// Page body without its item array, for page-level metadata lookups.
fn strip_items(body: &Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !matches!(k.as_str(), "results" | "items" | "values"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_link_header_next_and_last() {
        let header = r#"<https://api.github.com/repos/o/r/issues?per_page=100&page=2>; rel="next", <https://api.github.com/repos/o/r/issues?per_page=100&page=5>; rel="last""#;
        let pagination = parse_link_header(header);
        assert_eq!(
            pagination.next.as_deref(),
            Some("https://api.github.com/repos/o/r/issues?per_page=100&page=2")
        );
        assert_eq!(pagination.last_page, Some(5));
    }

    #[test]
    fn test_parse_link_header_without_next() {
        let header = r#"<https://api.github.com/x?page=1>; rel="first", <https://api.github.com/x?page=4>; rel="prev""#;
        let pagination = parse_link_header(header);
        assert_eq!(pagination.next, None);
        assert_eq!(pagination.last_page, None);
    }

    #[test]
    fn test_unwrap_envelope_accepts_arrays_and_results() {
        assert_eq!(unwrap_envelope(json!([1, 2])), vec![json!(1), json!(2)]);
        assert_eq!(
            unwrap_envelope(json!({"results": [{"id": 1}], "size": 1})),
            vec![json!({"id": 1})]
        );
        assert_eq!(unwrap_envelope(json!({"items": [3]})), vec![json!(3)]);
        assert!(unwrap_envelope(json!({"message": "nope"})).is_empty());
        assert!(unwrap_envelope(json!("text")).is_empty());
    }

    #[test]
    fn test_page_url_numbered_and_offset() {
        let base = Url::parse("https://api.github.com/repos/o/r/issues?state=all").unwrap();
        let numbered = PageRequest {
            style: PageStyle::Numbered,
            page_size: 100,
            max_pages: 10,
            max_items: None,
        };
        assert_eq!(
            page_url(&base, &numbered, 2),
            "https://api.github.com/repos/o/r/issues?state=all&per_page=100&page=2"
        );

        let base = Url::parse("https://acme.atlassian.net/wiki/rest/api/space").unwrap();
        let offset = PageRequest {
            style: PageStyle::Offset,
            page_size: 25,
            ..numbered
        };
        assert_eq!(
            page_url(&base, &offset, 3),
            "https://acme.atlassian.net/wiki/rest/api/space?limit=25&start=50"
        );
    }

    #[test]
    fn test_linked_next_reads_header_then_body_links() {
        let with_link = JsonPage {
            body: json!([]),
            headers: vec![(
                "Link".to_string(),
                r#"<https://api.github.com/x?page=2>; rel="next""#.to_string(),
            )],
        };
        assert_eq!(linked_next(&with_link), Some(true));

        let confluence_last = JsonPage {
            body: json!({"results": [], "_links": {"base": "https://acme.atlassian.net/wiki"}}),
            headers: Vec::new(),
        };
        assert_eq!(linked_next(&confluence_last), Some(false));

        let confluence_more = JsonPage {
            body: json!({"results": [], "_links": {"next": "/rest/api/space?start=25"}}),
            headers: Vec::new(),
        };
        assert_eq!(linked_next(&confluence_more), Some(true));

        let bare = JsonPage {
            body: json!([]),
            headers: Vec::new(),
        };
        assert_eq!(linked_next(&bare), None);
    }

    #[test]
    fn test_strip_items_keeps_page_metadata() {
        let meta = strip_items(&json!({"results": [1], "_links": {"base": "b"}, "size": 1}));
        assert_eq!(meta, json!({"_links": {"base": "b"}, "size": 1}));
    }
}
