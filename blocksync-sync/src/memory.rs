//! In-memory remote block store for tests.
//!
//! [`MemoryTransport`] models pages, blocks, child pages, comments and users
//! closely enough to exercise the protocol: erasing a page archives its child
//! pages, appends honour `after`, listings paginate, and restoring an archived
//! page puts it back at the end of its parent. Every call is recorded, and any
//! call kind can be made to fail on its N-th occurrence.

use crate::error::TransportError;
use crate::mapping::record_payload;
use crate::transport::{ChildrenPage, RawComment, RemoteRecord, Transport};
use blocksync_doc::{Block, decode_blocks};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::collections::HashMap;

/// A recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchChildren { container: String, cursor: Option<String> },
    FetchTitle(String),
    FetchAnnotations(String),
    ResolveDisplayName(String),
    Erase(String),
    Append { container: String, after: Option<String>, count: usize },
    Update(String),
    Delete(String),
    SetArchived { page: String, archived: bool },
    SetParent { page: String, parent: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    FetchChildren,
    FetchTitle,
    FetchAnnotations,
    ResolveDisplayName,
    Erase,
    Append,
    Update,
    Delete,
    SetArchived,
    SetParent,
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Self::FetchChildren { .. } => CallKind::FetchChildren,
            Self::FetchTitle(_) => CallKind::FetchTitle,
            Self::FetchAnnotations(_) => CallKind::FetchAnnotations,
            Self::ResolveDisplayName(_) => CallKind::ResolveDisplayName,
            Self::Erase(_) => CallKind::Erase,
            Self::Append { .. } => CallKind::Append,
            Self::Update(_) => CallKind::Update,
            Self::Delete(_) => CallKind::Delete,
            Self::SetArchived { .. } => CallKind::SetArchived,
            Self::SetParent { .. } => CallKind::SetParent,
        }
    }
}

/// A visible block, as a test sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBlock {
    pub id: String,
    pub kind: String,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct Node {
    kind: String,
    payload: Map<String, Value>,
    children: Vec<String>,
    parent: Option<String>,
    archived: bool,
}

#[derive(Debug, Clone)]
struct Fault {
    kind: CallKind,
    nth: usize,
    error: TransportError,
}

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<String, Node>,
    titles: HashMap<String, String>,
    comments: HashMap<String, Vec<RawComment>>,
    users: HashMap<String, String>,
    calls: Vec<Call>,
    faults: Vec<Fault>,
    next_id: u64,
    page_size: usize,
}

#[derive(Debug)]
pub struct MemoryTransport {
    state: RefCell<State>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(State {
                page_size: 100,
                ..State::default()
            }),
        }
    }

    /// Sets how many records one children listing returns.
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.borrow_mut().page_size = page_size.max(1);
        self
    }

    /// Adds a top-level page.
    pub fn add_page(&self, id: &str, title: &str) {
        let mut state = self.state.borrow_mut();
        state.nodes.insert(id.to_string(), Node::new("page", Map::new(), None));
        state.titles.insert(id.to_string(), title.to_string());
    }

    /// Adds a child page under `parent` with a chosen id.
    pub fn add_child_page(&self, parent: &str, id: &str, title: &str) {
        let mut state = self.state.borrow_mut();
        let payload = json!({ "title": title });
        state.insert_child(
            parent,
            id.to_string(),
            Node::new("child_page", as_map(&payload), Some(parent.to_string())),
            None,
        );
        state.titles.insert(id.to_string(), title.to_string());
    }

    /// Appends a block built from a raw payload and returns its id.
    pub fn add_block(&self, parent: &str, payload: &Value) -> String {
        let mut state = self.state.borrow_mut();
        state.create(parent, payload, None)
    }

    /// Seeds `parent` with the blocks of `markup`. Child page markers create
    /// child pages with the marker's id and title.
    pub fn add_markup(&self, parent: &str, markup: &str) -> Vec<String> {
        let mut ids = Vec::new();
        for block in decode_blocks(markup) {
            if let Block::ChildPage { id, title, .. } = &block {
                self.add_child_page(parent, id, title);
                ids.push(id.clone());
            } else if let Some(payload) = record_payload(&block) {
                ids.push(self.add_block(parent, &payload));
            }
        }
        ids
    }

    pub fn add_comment(&self, container: &str, comment: RawComment) {
        self.state
            .borrow_mut()
            .comments
            .entry(container.to_string())
            .or_default()
            .push(comment);
    }

    pub fn add_user(&self, id: &str, name: &str) {
        self.state
            .borrow_mut()
            .users
            .insert(id.to_string(), name.to_string());
    }

    /// Makes the `nth` call of `kind` in the call log (1-based) fail with
    /// `error`. Each fault fires once.
    pub fn fail_on(&self, kind: CallKind, nth: usize, error: TransportError) {
        self.state
            .borrow_mut()
            .faults
            .push(Fault { kind, nth, error });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Visible children of `container`, in order.
    pub fn blocks(&self, container: &str) -> Vec<MemoryBlock> {
        let state = self.state.borrow();
        state
            .visible_children(container)
            .into_iter()
            .filter_map(|id| {
                state.nodes.get(&id).map(|node| MemoryBlock {
                    id,
                    kind: node.kind.clone(),
                    payload: node.payload.clone(),
                })
            })
            .collect()
    }

    pub fn is_archived(&self, id: &str) -> bool {
        self.state
            .borrow()
            .nodes
            .get(id)
            .is_some_and(|node| node.archived)
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        let kind = call.kind();
        state.calls.push(call);
        let seen = state.calls.iter().filter(|call| call.kind() == kind).count();
        if let Some(index) = state
            .faults
            .iter()
            .position(|fault| fault.kind == kind && fault.nth == seen)
        {
            return Err(state.faults.remove(index).error);
        }
        Ok(())
    }
}

impl Node {
    fn new(kind: &str, payload: Map<String, Value>, parent: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            payload,
            children: Vec::new(),
            parent,
            archived: false,
        }
    }
}

fn as_map(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn not_found(id: &str) -> TransportError {
    TransportError::NotFound(id.to_string())
}

impl State {
    fn live(&self, id: &str) -> Result<&Node, TransportError> {
        self.nodes
            .get(id)
            .filter(|node| !node.archived)
            .ok_or_else(|| not_found(id))
    }

    fn visible_children(&self, id: &str) -> Vec<String> {
        self.nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .filter(|child| self.nodes.get(*child).is_some_and(|child| !child.archived))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:032x}", self.next_id)
    }

    fn insert_child(&mut self, parent: &str, id: String, node: Node, after: Option<usize>) {
        self.nodes.insert(id.clone(), node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            match after {
                Some(position) => parent.children.insert(position + 1, id),
                None => parent.children.push(id),
            }
        }
    }

    /// Creates a block (and any nested `children`) from a payload.
    fn create(&mut self, parent: &str, payload: &Value, after: Option<usize>) -> String {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("paragraph")
            .to_string();
        let mut body = payload.get(&kind).map(as_map).unwrap_or_default();
        let nested = body.remove("children");
        let id = self.next_id();
        self.insert_child(
            parent,
            id.clone(),
            Node::new(&kind, body, Some(parent.to_string())),
            after,
        );
        if let Some(Value::Array(children)) = nested {
            for child in &children {
                self.create(&id, child, None);
            }
        }
        id
    }

    fn detach(&mut self, id: &str) {
        let Some(parent) = self.nodes.get(id).and_then(|node| node.parent.clone()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| child != id);
        }
    }

    fn remove_subtree(&mut self, id: &str) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.remove_subtree(&child);
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn fetch_children(
        &self,
        container_id: &str,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, TransportError> {
        self.record(Call::FetchChildren {
            container: container_id.to_string(),
            cursor: cursor.map(str::to_string),
        })?;
        let state = self.state.borrow();
        state.live(container_id)?;
        let children = state.visible_children(container_id);
        let start = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| TransportError::Decode(format!("bad cursor {cursor:?}")))?,
            None => 0,
        };
        let end = (start + state.page_size).min(children.len());
        let results = children
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| {
                state.nodes.get(id).map(|node| RemoteRecord {
                    id: id.clone(),
                    kind: node.kind.clone(),
                    has_children: !state.visible_children(id).is_empty(),
                    payload: node.payload.clone(),
                    children: Vec::new(),
                })
            })
            .collect();
        Ok(ChildrenPage {
            results,
            next_cursor: (end < children.len()).then(|| end.to_string()),
        })
    }

    fn fetch_title(&self, page_id: &str) -> Result<String, TransportError> {
        self.record(Call::FetchTitle(page_id.to_string()))?;
        let state = self.state.borrow();
        state.live(page_id)?;
        state.titles.get(page_id).cloned().ok_or_else(|| not_found(page_id))
    }

    fn fetch_annotations(&self, container_id: &str) -> Result<Vec<RawComment>, TransportError> {
        self.record(Call::FetchAnnotations(container_id.to_string()))?;
        let state = self.state.borrow();
        state.live(container_id)?;
        Ok(state.comments.get(container_id).cloned().unwrap_or_default())
    }

    fn resolve_display_name(&self, user_id: &str) -> Result<String, TransportError> {
        self.record(Call::ResolveDisplayName(user_id.to_string()))?;
        self.state
            .borrow()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found(user_id))
    }

    fn erase_container(&self, container_id: &str) -> Result<(), TransportError> {
        self.record(Call::Erase(container_id.to_string()))?;
        let mut state = self.state.borrow_mut();
        state.live(container_id)?;
        let children = state
            .nodes
            .get_mut(container_id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            let is_page = state
                .nodes
                .get(&child)
                .is_some_and(|node| node.kind == "child_page");
            if is_page {
                if let Some(node) = state.nodes.get_mut(&child) {
                    node.archived = true;
                }
            } else {
                state.remove_subtree(&child);
            }
        }
        Ok(())
    }

    fn append_children(
        &self,
        container_id: &str,
        after: Option<&str>,
        children: &[Value],
    ) -> Result<Vec<String>, TransportError> {
        self.record(Call::Append {
            container: container_id.to_string(),
            after: after.map(str::to_string),
            count: children.len(),
        })?;
        let mut state = self.state.borrow_mut();
        let siblings = &state.live(container_id)?.children;
        let mut position = match after {
            Some(after) => Some(siblings.iter().position(|id| id == after).ok_or_else(|| {
                TransportError::Status {
                    code: 400,
                    body: format!("block {after} is not a child of {container_id}"),
                }
            })?),
            None => None,
        };
        let mut ids = Vec::with_capacity(children.len());
        for payload in children {
            let id = state.create(container_id, payload, position);
            position = position.map(|index| index + 1);
            ids.push(id);
        }
        Ok(ids)
    }

    fn update_block(&self, block_id: &str, payload: &Value) -> Result<(), TransportError> {
        self.record(Call::Update(block_id.to_string()))?;
        let mut state = self.state.borrow_mut();
        state.live(block_id)?;
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Status {
                code: 400,
                body: "update payload has no type".into(),
            })?
            .to_string();
        let body = payload.get(&kind).map(as_map).unwrap_or_default();
        if let Some(node) = state.nodes.get_mut(block_id) {
            if node.kind != kind {
                return Err(TransportError::Status {
                    code: 400,
                    body: format!("cannot change block type from {} to {kind}", node.kind),
                });
            }
            node.payload = body;
        }
        Ok(())
    }

    fn delete_block(&self, block_id: &str) -> Result<(), TransportError> {
        self.record(Call::Delete(block_id.to_string()))?;
        let mut state = self.state.borrow_mut();
        state.live(block_id)?;
        state.detach(block_id);
        state.remove_subtree(block_id);
        Ok(())
    }

    fn set_archived(&self, page_id: &str, archived: bool) -> Result<(), TransportError> {
        self.record(Call::SetArchived {
            page: page_id.to_string(),
            archived,
        })?;
        let mut state = self.state.borrow_mut();
        let parent = {
            let node = state.nodes.get_mut(page_id).ok_or_else(|| not_found(page_id))?;
            if node.archived == archived {
                return Ok(());
            }
            node.archived = archived;
            node.parent.clone()
        };
        if archived {
            state.detach(page_id);
        } else if let Some(parent) = parent
            && let Some(parent) = state.nodes.get_mut(&parent)
            && !parent.children.iter().any(|child| child == page_id)
        {
            parent.children.push(page_id.to_string());
        }
        Ok(())
    }

    fn set_parent(&self, page_id: &str, parent_id: &str) -> Result<(), TransportError> {
        self.record(Call::SetParent {
            page: page_id.to_string(),
            parent: parent_id.to_string(),
        })?;
        let mut state = self.state.borrow_mut();
        state.live(parent_id)?;
        state.live(page_id)?;
        let current = state.nodes.get(page_id).and_then(|node| node.parent.clone());
        let attached = state
            .nodes
            .get(parent_id)
            .is_some_and(|parent| parent.children.iter().any(|child| child == page_id));
        if current.as_deref() == Some(parent_id) && attached {
            return Ok(());
        }
        state.detach(page_id);
        if let Some(node) = state.nodes.get_mut(page_id) {
            node.parent = Some(parent_id.to_string());
        }
        if let Some(parent) = state.nodes.get_mut(parent_id) {
            parent.children.push(page_id.to_string());
        }
        Ok(())
    }
}
