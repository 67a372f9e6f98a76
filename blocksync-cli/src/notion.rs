//! HTTP transport for the Notion API.

use blocksync_sync::{ChildrenPage, RawComment, RemoteRecord, Transport, TransportError};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tracing::debug;
use ureq::http::Response;
use ureq::{Agent, Body, RequestBuilder};

pub const API_BASE: &str = "https://api.notion.com/v1";
pub const API_VERSION: &str = "2022-06-28";
const PAGE_SIZE: &str = "100";
const TIMEOUT: Duration = Duration::from_secs(30);

pub struct NotionTransport {
    agent: Agent,
    api_key: String,
    base: String,
}

impl NotionTransport {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base(api_key, API_BASE)
    }

    pub fn with_base(api_key: impl Into<String>, base: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            api_key: api_key.into(),
            base: base.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn authorized<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", API_VERSION)
            .header("Content-Type", "application/json")
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, TransportError> {
        let url = self.url(path);
        let mut request = self.authorized(self.agent.get(&url));
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        finish("GET", &url, Instant::now(), request.call())
    }

    fn patch(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(path);
        let request = self.authorized(self.agent.patch(&url));
        finish("PATCH", &url, Instant::now(), request.send_json(body))
    }

    fn delete(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        let request = self.authorized(self.agent.delete(&url));
        finish("DELETE", &url, Instant::now(), request.call())
    }

    /// GETs a paginated list, starting at `cursor`.
    fn list(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cursor: Option<&str>,
    ) -> Result<Value, TransportError> {
        let mut query = query.to_vec();
        query.push(("page_size", PAGE_SIZE));
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor));
        }
        self.get(path, &query)
    }
}

fn finish(
    method: &str,
    url: &str,
    started: Instant,
    result: Result<Response<Body>, ureq::Error>,
) -> Result<Value, TransportError> {
    let mut response = result.map_err(|err| TransportError::Network(err.to_string()))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|err| TransportError::Network(err.to_string()))?;
    debug!(
        method,
        url,
        status,
        bytes = text.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "remote call"
    );
    match status {
        404 => Err(TransportError::NotFound(text)),
        400.. => Err(TransportError::Status { code: status, body: text }),
        _ if text.trim().is_empty() => Ok(Value::Null),
        _ => serde_json::from_str(&text).map_err(|err| TransportError::Decode(err.to_string())),
    }
}

fn results(value: &Value) -> &[Value] {
    value
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn next_cursor(value: &Value) -> Option<String> {
    if value.get("has_more").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    value
        .get("next_cursor")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn children_page(value: &Value) -> Result<ChildrenPage, TransportError> {
    Ok(ChildrenPage {
        results: results(value)
            .iter()
            .map(RemoteRecord::from_block_json)
            .collect::<Result<_, _>>()?,
        next_cursor: next_cursor(value),
    })
}

fn joined_plain_text(items: Option<&Value>) -> String {
    items
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// The page title lives in whichever property has a `title` array.
fn page_title(page: &Value) -> Result<String, TransportError> {
    page.get("properties")
        .and_then(Value::as_object)
        .and_then(|properties| {
            properties.values().find_map(|property| {
                let title = property.get("title")?;
                (!title.as_array()?.is_empty()).then(|| joined_plain_text(Some(title)))
            })
        })
        .ok_or_else(|| TransportError::Decode("page has no title property".into()))
}

fn comment(value: &Value) -> RawComment {
    let text_field = |object: Option<&Value>, key: &str| {
        object
            .and_then(|object| object.get(key))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };
    let created_by = value.get("created_by");
    RawComment {
        id: text_field(Some(value), "id").unwrap_or_default(),
        author_id: text_field(created_by, "id"),
        author_name: text_field(created_by, "name"),
        created_at: text_field(Some(value), "created_time").unwrap_or_default(),
        text: joined_plain_text(value.get("rich_text")),
        parent_block_id: text_field(value.get("parent"), "block_id"),
    }
}

/// Strips the envelope fields the update endpoint rejects.
fn update_body(payload: &Value) -> Value {
    let mut body = payload.clone();
    if let Some(object) = body.as_object_mut() {
        object.remove("object");
        object.remove("type");
    }
    body
}

impl Transport for NotionTransport {
    fn fetch_children(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, TransportError> {
        let value = self.list(&format!("/blocks/{container_id}/children"), &[], cursor)?;
        children_page(&value)
    }

    fn fetch_title(&self, page_id: &str) -> Result<String, TransportError> {
        page_title(&self.get(&format!("/pages/{page_id}"), &[])?)
    }

    fn fetch_annotations(&self, container_id: &str) -> Result<Vec<RawComment>, TransportError> {
        let mut comments = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let value = self.list("/comments", &[("block_id", container_id)], cursor.as_deref())?;
            comments.extend(results(&value).iter().map(comment));
            match next_cursor(&value) {
                Some(next) => cursor = Some(next),
                None => return Ok(comments),
            }
        }
    }

    fn resolve_display_name(&self, user_id: &str) -> Result<String, TransportError> {
        let user = self.get(&format!("/users/{user_id}"), &[])?;
        Ok(user
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn erase_container(&self, container_id: &str) -> Result<(), TransportError> {
        self.patch(&format!("/pages/{container_id}"), &json!({ "erase_content": true }))?;
        Ok(())
    }

    fn append_children(
        &self,
        container_id: &str,
        after: Option<&str>,
        children: &[Value],
    ) -> Result<Vec<String>, TransportError> {
        let mut body = json!({ "children": children });
        if let Some(after) = after {
            body["after"] = json!(after);
        }
        let value = self.patch(&format!("/blocks/{container_id}/children"), &body)?;
        Ok(results(&value)
            .iter()
            .filter_map(|block| block.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    fn update_block(&self, block_id: &str, payload: &Value) -> Result<(), TransportError> {
        self.patch(&format!("/blocks/{block_id}"), &update_body(payload))?;
        Ok(())
    }

    fn delete_block(&self, block_id: &str) -> Result<(), TransportError> {
        self.delete(&format!("/blocks/{block_id}"))?;
        Ok(())
    }

    fn set_archived(&self, page_id: &str, archived: bool) -> Result<(), TransportError> {
        self.patch(&format!("/pages/{page_id}"), &json!({ "archived": archived }))?;
        Ok(())
    }

    fn set_parent(&self, page_id: &str, parent_id: &str) -> Result<(), TransportError> {
        self.patch(
            &format!("/pages/{page_id}"),
            &json!({ "parent": { "page_id": parent_id } }),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_page_decodes_records_and_cursor() {
        let value = json!({
            "results": [
                {"id": "b1", "type": "paragraph", "has_children": false,
                 "paragraph": {"rich_text": []}},
                {"id": "c1", "type": "child_page", "child_page": {"title": "Sub"}},
            ],
            "has_more": true,
            "next_cursor": "b2",
        });
        let page = children_page(&value).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[1].child_page_title(), Some("Sub"));
        assert_eq!(page.next_cursor.as_deref(), Some("b2"));

        let last = json!({"results": [], "has_more": false, "next_cursor": null});
        assert_eq!(children_page(&last).unwrap().next_cursor, None);
    }

    #[test]
    fn test_malformed_block_is_decode_error() {
        let value = json!({"results": [{"type": "paragraph"}]});
        assert!(matches!(children_page(&value), Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_page_title_from_any_title_property() {
        let page = json!({"properties": {
            "Tags": {"multi_select": []},
            "Name": {"title": [{"plain_text": "Weekly "}, {"plain_text": "notes"}]},
        }});
        assert_eq!(page_title(&page).unwrap(), "Weekly notes");
        assert!(page_title(&json!({"properties": {}})).is_err());
    }

    #[test]
    fn test_comment_fields() {
        let value = json!({
            "id": "cm1",
            "created_time": "2026-01-05T10:00:00.000Z",
            "created_by": {"object": "user", "id": "u1"},
            "rich_text": [{"plain_text": "Looks "}, {"plain_text": "good"}],
            "parent": {"type": "block_id", "block_id": "b1"},
        });
        let comment = comment(&value);
        assert_eq!(comment.author_id.as_deref(), Some("u1"));
        assert_eq!(comment.author_name, None);
        assert_eq!(comment.text, "Looks good");
        assert_eq!(comment.parent_block_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_update_body_drops_envelope() {
        let payload = json!({"object": "block", "type": "paragraph", "paragraph": {"rich_text": []}});
        assert_eq!(
            update_body(&payload),
            json!({"paragraph": {"rich_text": []}})
        );
    }
}
