//! Boundary to the remote block store.
//!
//! Implementations own authentication, pagination cursors, timeouts and the
//! wire format. Everything above this trait works with [`RemoteRecord`]s and
//! never sees raw responses.

use crate::error::TransportError;
use serde_json::{Map, Value};

/// One remote block as returned by a children listing.
///
/// `payload` is the type-specific object (the value stored under the block's
/// type key). `children` is empty as fetched; the session fills it in when it
/// expands the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub id: String,
    pub kind: String,
    pub has_children: bool,
    pub payload: Map<String, Value>,
    pub children: Vec<RemoteRecord>,
}

impl RemoteRecord {
    /// Decodes a block object of the form
    /// `{"id": .., "type": kind, "has_children": .., kind: {..}}`.
    pub fn from_block_json(value: &Value) -> Result<Self, TransportError> {
        let object = value
            .as_object()
            .ok_or_else(|| TransportError::Decode("block is not an object".into()))?;
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Decode("block has no id".into()))?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Decode(format!("block {id} has no type")))?;
        let payload = object
            .get(kind)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            id: id.to_string(),
            kind: kind.to_string(),
            has_children: object
                .get("has_children")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            payload,
            children: Vec::new(),
        })
    }

    pub fn is_child_page(&self) -> bool {
        self.kind == "child_page"
    }

    /// Title of a child page record.
    pub fn child_page_title(&self) -> Option<&str> {
        if !self.is_child_page() {
            return None;
        }
        Some(self.payload.get("title").and_then(Value::as_str).unwrap_or(""))
    }
}

/// One page of a children listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildrenPage {
    pub results: Vec<RemoteRecord>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// A remote comment before author resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawComment {
    pub id: String,
    pub author_id: Option<String>,
    /// Display name when the remote already embeds it.
    pub author_name: Option<String>,
    /// RFC 3339 timestamp as sent by the remote.
    pub created_at: String,
    pub text: String,
    pub parent_block_id: Option<String>,
}

/// Remote operations the protocol needs. Every method is a single remote call
/// and is expected to time out on its own.
pub trait Transport {
    fn fetch_children(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, TransportError>;

    fn fetch_title(&self, page_id: &str) -> Result<String, TransportError>;

    fn fetch_annotations(&self, container_id: &str) -> Result<Vec<RawComment>, TransportError>;

    fn resolve_display_name(&self, user_id: &str) -> Result<String, TransportError>;

    /// Removes all content of a page in one call. Child pages are archived,
    /// not deleted.
    fn erase_container(&self, container_id: &str) -> Result<(), TransportError>;

    /// Appends block payloads after `after` (or at the end) and returns the
    /// ids of the created top-level blocks in order.
    fn append_children(
        &self,
        container_id: &str,
        after: Option<&str>,
        children: &[Value],
    ) -> Result<Vec<String>, TransportError>;

    /// Replaces a block's content in place. The payload's type must match
    /// the block's type.
    fn update_block(&self, block_id: &str, payload: &Value) -> Result<(), TransportError>;

    fn delete_block(&self, block_id: &str) -> Result<(), TransportError>;

    fn set_archived(&self, page_id: &str, archived: bool) -> Result<(), TransportError>;

    fn set_parent(&self, page_id: &str, parent_id: &str) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_children(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, TransportError> {
        (**self).fetch_children(container_id, cursor)
    }

    fn fetch_title(&self, page_id: &str) -> Result<String, TransportError> {
        (**self).fetch_title(page_id)
    }

    fn fetch_annotations(&self, container_id: &str) -> Result<Vec<RawComment>, TransportError> {
        (**self).fetch_annotations(container_id)
    }

    fn resolve_display_name(&self, user_id: &str) -> Result<String, TransportError> {
        (**self).resolve_display_name(user_id)
    }

    fn erase_container(&self, container_id: &str) -> Result<(), TransportError> {
        (**self).erase_container(container_id)
    }

    fn append_children(
        &self,
        container_id: &str,
        after: Option<&str>,
        children: &[Value],
    ) -> Result<Vec<String>, TransportError> {
        (**self).append_children(container_id, after, children)
    }

    fn update_block(&self, block_id: &str, payload: &Value) -> Result<(), TransportError> {
        (**self).update_block(block_id, payload)
    }

    fn delete_block(&self, block_id: &str) -> Result<(), TransportError> {
        (**self).delete_block(block_id)
    }

    fn set_archived(&self, page_id: &str, archived: bool) -> Result<(), TransportError> {
        (**self).set_archived(page_id, archived)
    }

    fn set_parent(&self, page_id: &str, parent_id: &str) -> Result<(), TransportError> {
        (**self).set_parent(page_id, parent_id)
    }
}
