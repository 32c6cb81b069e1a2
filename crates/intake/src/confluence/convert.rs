//! Confluence items to [`Document`]s.
//!
//! Bodies arrive in storage format (XHTML); they are reduced to plain text
//! before use as content or description.

use scraper::Html;
use serde_json::{Value, json};

use crate::platform::convert::{
    at, author, collapse_whitespace, content_or_title, created_or_epoch, describe, document_id,
    excerpt, extra, names_at, str_at, time_at,
};
use crate::platform::{Document, ResourceType};

/// Pointers to the space key and link base recorded by the fetchers.
const SPACE_POINTER: &str = "/_space";
const BASE_POINTER: &str = "/_base";
const TASK_TITLE_CHARS: usize = 80;

/// Plain text of a storage-format fragment.
pub fn storage_to_text(xhtml: &str) -> String {
    let fragment = Html::parse_fragment(xhtml);
    let text: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

fn body_text(raw: &Value) -> Option<String> {
    str_at(raw, &["/body/storage/value", "/body/view/value", "/body"])
        .map(|xhtml| storage_to_text(&xhtml))
        .filter(|text| !text.is_empty())
}

/// `{base}{relative}` for a link under `_links`, or the link as-is when it is
/// already absolute.
fn link(raw: &Value, name: &str) -> Option<String> {
    let pointer = format!("/_links/{name}");
    let relative = str_at(raw, &[pointer.as_str()])?;
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return Some(relative);
    }
    let base = str_at(raw, &[BASE_POINTER, "/_links/base"]).unwrap_or_default();
    Some(format!("{}{relative}", base.trim_end_matches('/')))
}

fn space_key(raw: &Value) -> Value {
    str_at(raw, &["/space/key", SPACE_POINTER])
        .map(Value::String)
        .unwrap_or(Value::Null)
}

pub fn space(raw: &Value) -> Document {
    let key = str_at(raw, &["/key", SPACE_POINTER]).unwrap_or_default();
    let name = str_at(raw, &["/name"]).unwrap_or_else(|| key.clone());
    let summary = str_at(raw, &["/description/plain/value"]);
    let created = time_at(raw, &["/history/createdDate"]);

    Document {
        id: document_id(ResourceType::Space, raw, &["/id", "/key"]),
        resource_type: ResourceType::Space,
        description: describe(None, summary.clone(), || format!("Confluence space {name} ({key})")),
        content: content_or_title(summary, &name),
        title: name,
        url: link(raw, "webui").unwrap_or_default(),
        created_at: created_or_epoch(created, None),
        updated_at: None,
        author: author(raw.pointer("/history/createdBy")),
        extra: extra([
            ("key", Value::String(key)),
            ("space_type", at(raw, "/type")),
            ("status", at(raw, "/status")),
            ("homepage_id", at(raw, "/homepage/id")),
        ]),
    }
}

/// Page or blog post.
pub fn content(resource: ResourceType, raw: &Value) -> Document {
    let title = str_at(raw, &["/title"]).unwrap_or_default();
    let body = body_text(raw);
    let updated_at = time_at(raw, &["/version/when", "/history/lastUpdated/when"]);
    let noun = if resource == ResourceType::BlogPost {
        "Blog post"
    } else {
        "Page"
    };
    let space = space_key(raw);
    let ancestors = raw
        .pointer("/ancestors")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Document {
        id: document_id(resource, raw, &["/id"]),
        resource_type: resource,
        description: describe(body.as_deref(), None, || match space.as_str() {
            Some(key) => format!("{noun} {title} in space {key}"),
            None => format!("{noun} {title}"),
        }),
        content: content_or_title(body, &title),
        url: link(raw, "webui").or_else(|| link(raw, "tinyui")).unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/history/createdDate"]), updated_at),
        updated_at,
        author: author(raw.pointer("/history/createdBy").or_else(|| raw.pointer("/version/by"))),
        extra: extra([
            ("space_key", space),
            ("version", at(raw, "/version/number")),
            ("status", at(raw, "/status")),
            ("labels", json!(names_at(raw, "/metadata/labels/results", "name"))),
            ("ancestors", json!(names_at(raw, "/ancestors", "title"))),
            ("parent_id", ancestors.last().map(|a| at(a, "/id")).unwrap_or(Value::Null)),
            (
                "last_updated_by",
                str_at(
                    raw,
                    &["/version/by/displayName", "/history/lastUpdated/by/displayName"],
                )
                .map(Value::String)
                .unwrap_or(Value::Null),
            ),
        ]),
        title,
    }
}

pub fn attachment(raw: &Value) -> Document {
    let title = str_at(raw, &["/title"]).unwrap_or_default();
    let media_type = str_at(raw, &["/extensions/mediaType", "/metadata/mediaType"]);
    let comment = str_at(raw, &["/metadata/comment", "/extensions/comment"]);
    let updated_at = time_at(raw, &["/version/when"]);

    Document {
        id: document_id(ResourceType::Attachment, raw, &["/id"]),
        resource_type: ResourceType::Attachment,
        description: describe(None, comment, || match &media_type {
            Some(media_type) => format!("File: {title} ({media_type})"),
            None => format!("File: {title}"),
        }),
        content: title.clone(),
        url: link(raw, "webui").or_else(|| link(raw, "download")).unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/history/createdDate"]), updated_at),
        updated_at,
        author: author(raw.pointer("/history/createdBy").or_else(|| raw.pointer("/version/by"))),
        extra: extra([
            ("space_key", space_key(raw)),
            ("media_type", media_type.clone().map(Value::String).unwrap_or(Value::Null)),
            ("file_size", at(raw, "/extensions/fileSize")),
            ("version", at(raw, "/version/number")),
            ("container_id", at(raw, "/container/id")),
            ("container_title", at(raw, "/container/title")),
            (
                "download_url",
                link(raw, "download").map(Value::String).unwrap_or(Value::Null),
            ),
        ]),
        title,
    }
}

pub fn comment(raw: &Value) -> Document {
    let body = body_text(raw);
    let container_title = str_at(raw, &["/container/title"]);
    let title = str_at(raw, &["/title"]).unwrap_or_else(|| match &container_title {
        Some(container) => format!("Comment on {container}"),
        None => "Comment".to_string(),
    });
    let updated_at = time_at(raw, &["/version/when"]);

    Document {
        id: document_id(ResourceType::Comment, raw, &["/id"]),
        resource_type: ResourceType::Comment,
        description: describe(body.as_deref(), None, || title.clone()),
        content: content_or_title(body, &title),
        url: link(raw, "webui").unwrap_or_default(),
        created_at: created_or_epoch(time_at(raw, &["/history/createdDate"]), updated_at),
        updated_at,
        author: author(raw.pointer("/history/createdBy").or_else(|| raw.pointer("/version/by"))),
        extra: extra([
            ("space_key", space_key(raw)),
            ("version", at(raw, "/version/number")),
            ("container_id", at(raw, "/container/id")),
            (
                "container_title",
                container_title.map(Value::String).unwrap_or(Value::Null),
            ),
            ("container_type", at(raw, "/container/type")),
            ("location", at(raw, "/extensions/location")),
        ]),
        title,
    }
}

/// Inline task. Dates are epoch milliseconds.
pub fn task(raw: &Value) -> Document {
    let task_id = str_at(raw, &["/globalId", "/id"]);
    let body = body_text(raw);
    let title = match (&body, &task_id) {
        (Some(text), _) => excerpt(text, TASK_TITLE_CHARS),
        (None, Some(id)) => format!("Task {id}"),
        (None, None) => "Task".to_string(),
    };
    let updated_at = time_at(raw, &["/updateDate", "/completeDate"]);
    let content_id = str_at(raw, &["/contentId"]);
    let base = str_at(raw, &[BASE_POINTER]);

    Document {
        id: document_id(ResourceType::Task, raw, &["/globalId", "/id"]),
        resource_type: ResourceType::Task,
        description: describe(body.as_deref(), None, || title.clone()),
        content: content_or_title(body, &title),
        url: match (base, &content_id) {
            (Some(base), Some(id)) => format!("{}/pages/viewpage.action?pageId={id}", base.trim_end_matches('/')),
            _ => String::new(),
        },
        created_at: created_or_epoch(time_at(raw, &["/createDate"]), updated_at),
        updated_at,
        author: author(raw.get("creator")),
        extra: extra([
            ("status", at(raw, "/status")),
            ("content_id", content_id.map(Value::String).unwrap_or(Value::Null)),
            ("assignee", at(raw, "/assignee")),
            ("due_date", at(raw, "/dueDate")),
            ("completed_at", at(raw, "/completeDate")),
            ("completed_by", at(raw, "/completeUser")),
            ("space_key", at(raw, SPACE_POINTER)),
        ]),
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_storage_to_text_strips_markup() {
        let xhtml = "<p>Hello <strong>world</strong></p>\n<ul><li>one</li><li>two</li></ul>\
                     <ac:structured-macro ac:name=\"info\"><ac:rich-text-body><p>note</p></ac:rich-text-body></ac:structured-macro>";
        assert_eq!(storage_to_text(xhtml), "Hello world one two note");
        assert_eq!(storage_to_text(""), "");
    }

    #[test]
    fn test_page_document() {
        let raw = json!({
            "id": "123",
            "type": "page",
            "status": "current",
            "title": "Runbook",
            "space": {"key": "ENG"},
            "body": {"storage": {"value": "<p>Restart the <em>service</em>.</p>"}},
            "version": {"number": 4, "when": "2024-05-02T10:00:00.000Z", "by": {"displayName": "Bo"}},
            "history": {
                "createdDate": "2024-01-01T00:00:00.000Z",
                "createdBy": {"accountId": "abc", "displayName": "Ada"}
            },
            "metadata": {"labels": {"results": [{"name": "ops"}, {"name": "oncall"}]}},
            "ancestors": [{"id": "1", "title": "Home"}, {"id": "9", "title": "Ops"}],
            "_links": {"webui": "/spaces/ENG/pages/123/Runbook"},
            "_base": "https://acme.atlassian.net/wiki"
        });

        let doc = content(ResourceType::Page, &raw);
        assert_eq!(doc.id, "page-123");
        assert_eq!(doc.content, "Restart the service .");
        assert_eq!(doc.url, "https://acme.atlassian.net/wiki/spaces/ENG/pages/123/Runbook");
        assert_eq!(doc.author.id, "abc");
        assert_eq!(doc.author.name, "Ada");
        assert_eq!(doc.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(doc.updated_at, Some(Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap()));
        assert_eq!(doc.extra["labels"], json!(["ops", "oncall"]));
        assert_eq!(doc.extra["ancestors"], json!(["Home", "Ops"]));
        assert_eq!(doc.extra["parent_id"], "9");
        assert_eq!(doc.extra["version"], 4);
        assert_eq!(doc.extra["space_key"], "ENG");
        assert_eq!(doc.extra["last_updated_by"], "Bo");
    }

    #[test]
    fn test_empty_blog_post_falls_back() {
        let doc = content(ResourceType::BlogPost, &json!({"id": 5, "title": "News", "_space": "ENG"}));
        assert_eq!(doc.id, "blog-5");
        assert_eq!(doc.content, "News");
        assert_eq!(doc.description, "Blog post News in space ENG");
        assert_eq!(doc.author.id, "unknown");
        assert_eq!(doc.url, "");
    }

    #[test]
    fn test_attachment_description_names_media_type() {
        let raw = json!({
            "id": "att9",
            "title": "diagram.png",
            "extensions": {"mediaType": "image/png", "fileSize": 2048},
            "container": {"id": "123", "title": "Runbook"},
            "_links": {"download": "/download/attachments/123/diagram.png"},
            "_base": "https://acme.atlassian.net/wiki"
        });
        let doc = attachment(&raw);
        assert_eq!(doc.description, "File: diagram.png (image/png)");
        assert_eq!(doc.content, "diagram.png");
        assert_eq!(
            doc.extra["download_url"],
            "https://acme.atlassian.net/wiki/download/attachments/123/diagram.png"
        );
        assert_eq!(doc.extra["file_size"], 2048);
    }

    #[test]
    fn test_comment_title_uses_container() {
        let raw = json!({
            "id": "c1",
            "body": {"storage": {"value": "<p>LGTM</p>"}},
            "container": {"id": "123", "title": "Runbook", "type": "page"}
        });
        let doc = comment(&raw);
        assert_eq!(doc.title, "Comment on Runbook");
        assert_eq!(doc.content, "LGTM");
        assert_eq!(doc.extra["container_type"], "page");
    }

    #[test]
    fn test_task_uses_epoch_millis_and_first_text() {
        let raw = json!({
            "globalId": 77,
            "id": 3,
            "contentId": 123,
            "status": "incomplete",
            "body": "<span>Rotate the keys</span>",
            "creator": "acc-1",
            "createDate": 1700000000000_i64,
            "_space": "ENG",
            "_base": "https://acme.atlassian.net/wiki"
        });
        let doc = task(&raw);
        assert_eq!(doc.id, "task-77");
        assert_eq!(doc.title, "Rotate the keys");
        assert_eq!(doc.created_at, Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap());
        assert_eq!(doc.author.id, "acc-1");
        assert_eq!(doc.url, "https://acme.atlassian.net/wiki/pages/viewpage.action?pageId=123");
        assert_eq!(doc.extra["space_key"], "ENG");
    }

    #[test]
    fn test_task_without_body_is_named_by_id() {
        let doc = task(&json!({"id": 3}));
        assert_eq!(doc.title, "Task 3");
        assert_eq!(doc.content, "Task 3");
    }

    #[test]
    fn test_space_document() {
        let raw = json!({
            "id": 98,
            "key": "ENG",
            "name": "Engineering",
            "type": "global",
            "description": {"plain": {"value": "All things eng"}},
            "_links": {"webui": "/spaces/ENG"},
            "_base": "https://acme.atlassian.net/wiki"
        });
        let doc = space(&raw);
        assert_eq!(doc.id, "space-98");
        assert_eq!(doc.title, "Engineering");
        assert_eq!(doc.content, "All things eng");
        assert_eq!(doc.description, "All things eng");
        assert_eq!(doc.url, "https://acme.atlassian.net/wiki/spaces/ENG");
        assert_eq!(doc.extra["space_type"], "global");

        let bare = space(&json!({"key": "OPS"}));
        assert_eq!(bare.id, "space-OPS");
        assert_eq!(bare.description, "Confluence space OPS (OPS)");
    }
}
