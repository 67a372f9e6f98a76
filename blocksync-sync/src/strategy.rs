//! Push strategy selection.
//!
//! [`choose_strategy`] looks at the current remote outline and the local
//! blocks and returns a plan; it makes no remote calls. The executors in
//! `push` carry the plan out.
//!
//! Two plans exist. A full replace erases the page, appends every local block
//! and restores the child pages, which then sit at the end of the page. A
//! position-preserving edit keeps the child pages where they are and splices
//! new content around them, using the first ordinary remote block as a
//! placeholder splice point.

use crate::transport::RemoteRecord;
use blocksync_doc::{Block, TextSpan};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// One top-level remote block, reduced to what selection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub id: String,
    /// Title when the block is a child page.
    pub child_page: Option<String>,
}

impl OutlineEntry {
    pub fn block(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            child_page: None,
        }
    }

    pub fn child_page(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            child_page: Some(title.into()),
        }
    }

    pub fn from_record(record: &RemoteRecord) -> Self {
        Self {
            id: record.id.clone(),
            child_page: record.child_page_title().map(str::to_string),
        }
    }
}

/// Why a position-preserving edit was not possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Every remote block is a child page, so there is nothing to splice
    /// around.
    NoAnchorBlock,
    /// A child page leads the remote page but local content precedes its
    /// marker.
    ChildPageDisplaced { id: String, title: String },
    /// Local markers list child pages in a different order than the remote.
    ChildPagesReordered,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAnchorBlock => f.write_str("the remote page has no ordinary block to anchor on"),
            Self::ChildPageDisplaced { title, .. } => write!(
                f,
                "local content precedes child page \"{title}\", which leads the remote page"
            ),
            Self::ChildPagesReordered => {
                f.write_str("child page markers are not in the remote order")
            }
        }
    }
}

/// Where a section of new blocks is spliced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertionPoint {
    Placeholder,
    ChildPage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub after: InsertionPoint,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    FullReplace {
        /// Blocks to append. Contains no child page markers.
        blocks: Vec<Block>,
        /// Child pages to bring back after the erase, in remote order.
        restore: Vec<String>,
        fallback: Option<FallbackReason>,
        warnings: Vec<String>,
    },
    PreservePositions {
        /// Remote block overwritten with an empty placeholder.
        anchor: String,
        /// Every other ordinary remote block.
        delete: Vec<String>,
        /// Non-empty sections in local order.
        sections: Vec<Section>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    FullReplace,
    PreservePositions,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::FullReplace { .. } => StrategyKind::FullReplace,
            Self::PreservePositions { .. } => StrategyKind::PreservePositions,
        }
    }
}

/// Text of the paragraph left where a child page marker was when the push
/// cannot keep that child page in place.
pub fn displacement_warning(title: &str) -> String {
    format!("⚠️ Child page \"{title}\" was here; after this push it appears at the end of the page.")
}

/// Chooses how to push `local` onto a remote page whose top-level blocks are
/// `outline`.
///
/// Markers naming child pages the remote does not have are dropped. The
/// position-preserving edit is chosen only when at least one marker maps to a
/// remote child page, an ordinary remote block exists to anchor on, no
/// leading child page would have local content spliced before it, and the
/// mapped markers follow the remote order.
pub fn choose_strategy(outline: &[OutlineEntry], local: &[Block]) -> Strategy {
    let remote_pages: HashMap<&str, (usize, &str)> = outline
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            entry
                .child_page
                .as_deref()
                .map(|title| (entry.id.as_str(), (index, title)))
        })
        .collect();
    let restore: Vec<String> = outline
        .iter()
        .filter(|entry| entry.child_page.is_some())
        .map(|entry| entry.id.clone())
        .collect();

    let blocks: Vec<Block> = local
        .iter()
        .filter(|block| {
            block
                .child_page_id()
                .is_none_or(|id| remote_pages.contains_key(id))
        })
        .cloned()
        .collect();
    let mapped: Vec<&str> = blocks.iter().filter_map(Block::child_page_id).collect();

    if mapped.is_empty() {
        return full_replace(blocks, restore, None, &remote_pages);
    }

    let Some(anchor_index) = outline.iter().position(|entry| entry.child_page.is_none()) else {
        return full_replace(blocks, restore, Some(FallbackReason::NoAnchorBlock), &remote_pages);
    };

    if let Some(reason) = displaced_child_page(&blocks, &remote_pages, anchor_index) {
        return full_replace(blocks, restore, Some(reason), &remote_pages);
    }

    let remote_order: Vec<usize> = mapped
        .iter()
        .filter_map(|id| remote_pages.get(id).map(|(index, _)| *index))
        .collect();
    if remote_order.windows(2).any(|pair| pair[0] >= pair[1]) {
        return full_replace(
            blocks,
            restore,
            Some(FallbackReason::ChildPagesReordered),
            &remote_pages,
        );
    }

    let anchor = outline[anchor_index].id.clone();
    let delete = outline
        .iter()
        .filter(|entry| entry.child_page.is_none() && entry.id != anchor)
        .map(|entry| entry.id.clone())
        .collect();
    Strategy::PreservePositions {
        anchor,
        delete,
        sections: split_sections(blocks),
    }
}

/// A child page before the anchor stays above the placeholder, so local
/// content placed before its marker cannot be honoured.
fn displaced_child_page(
    blocks: &[Block],
    remote_pages: &HashMap<&str, (usize, &str)>,
    anchor_index: usize,
) -> Option<FallbackReason> {
    let mut content_seen = false;
    for block in blocks {
        match block.child_page_id() {
            Some(id) => {
                let Some(&(index, title)) = remote_pages.get(id) else {
                    continue;
                };
                if index < anchor_index && content_seen {
                    return Some(FallbackReason::ChildPageDisplaced {
                        id: id.to_string(),
                        title: title.to_string(),
                    });
                }
            }
            None => content_seen = true,
        }
    }
    None
}

fn full_replace(
    blocks: Vec<Block>,
    restore: Vec<String>,
    fallback: Option<FallbackReason>,
    remote_pages: &HashMap<&str, (usize, &str)>,
) -> Strategy {
    let mut warnings = Vec::new();
    let blocks = blocks
        .into_iter()
        .filter_map(|block| match &block {
            Block::ChildPage { id, title, .. } => {
                fallback.as_ref()?;
                let remote_title = remote_pages.get(id.as_str()).map(|(_, title)| *title);
                let title = remote_title.filter(|title| !title.is_empty()).unwrap_or(title);
                let warning = displacement_warning(title);
                warnings.push(warning.clone());
                Some(Block::Paragraph {
                    spans: vec![TextSpan::plain(warning)],
                })
            }
            _ => Some(block),
        })
        .collect();
    Strategy::FullReplace {
        blocks,
        restore,
        fallback,
        warnings,
    }
}

fn split_sections(blocks: Vec<Block>) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        after: InsertionPoint::Placeholder,
        blocks: Vec::new(),
    };
    for block in blocks {
        if let Block::ChildPage { id, .. } = &block {
            let next = Section {
                after: InsertionPoint::ChildPage(id.clone()),
                blocks: Vec::new(),
            };
            let finished = std::mem::replace(&mut current, next);
            if !finished.blocks.is_empty() {
                sections.push(finished);
            }
        } else {
            current.blocks.push(block);
        }
    }
    if !current.blocks.is_empty() {
        sections.push(current);
    }
    sections
}
