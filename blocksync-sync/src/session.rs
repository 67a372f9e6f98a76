//! Pull and diff, plus the remote fetches they share with push.

use crate::config::SyncConfig;
use crate::error::{StepExt, SyncError, SyncStep};
use crate::mapping::blocks_from_records;
use crate::names::{NameCache, UNKNOWN_AUTHOR};
use crate::transport::{RemoteRecord, Transport};
use blocksync_doc::{
    Annotation, DiffLine, Document, RemoteId, canonicalize, encode_blocks, line_diff,
    parse_document, render_document,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Report text when local and remote agree.
pub const NO_CHANGES: &str = "No changes detected.";

const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 100;

/// One client session against a remote store.
///
/// The session owns the transport and the author name cache; each pull, push
/// or diff runs to completion before returning.
#[derive(Debug)]
pub struct Session<T> {
    pub(crate) transport: T,
    pub(crate) names: NameCache,
    pub(crate) config: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    pub document: Document,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub path: PathBuf,
    pub remote_id: RemoteId,
    pub lines: Vec<DiffLine>,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        !self.lines.is_empty()
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes() {
            return f.write_str(NO_CHANGES);
        }
        writeln!(
            f,
            "Comparing {} against remote page {}",
            self.path.display(),
            self.remote_id
        )?;
        writeln!(f)?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SyncConfig::default())
    }

    pub fn with_config(transport: T, config: SyncConfig) -> Self {
        Self {
            transport,
            names: NameCache::new(),
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn names(&self) -> &NameCache {
        &self.names
    }

    /// Fetches the direct children of `container`, following pagination.
    pub fn fetch_records(&self, container: &str) -> Result<Vec<RemoteRecord>, SyncError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .transport
                .fetch_children(container, cursor.as_deref())
                .during(|| SyncStep::FetchBlocks {
                    container: container.to_string(),
                })?;
            debug!(container, count = page.results.len(), "fetched children page");
            records.extend(page.results);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(records),
            }
        }
    }

    /// Fetches the whole tree under `container`. Child pages are never
    /// expanded.
    pub fn fetch_tree(&self, container: &str) -> Result<Vec<RemoteRecord>, SyncError> {
        let mut records = self.fetch_records(container)?;
        for record in &mut records {
            if record.has_children && !record.is_child_page() {
                record.children = self.fetch_tree(&record.id)?;
            }
        }
        Ok(records)
    }

    /// Fetches a page and writes it to `<dir>/<title>.md`, where `dir`
    /// defaults to the configured output directory.
    pub fn pull(&self, raw_id: &str, output_dir: Option<&Path>) -> Result<PullResult, SyncError> {
        let remote_id = RemoteId::parse(raw_id)?;
        let title = match self.transport.fetch_title(remote_id.as_str()) {
            Ok(title) if !title.trim().is_empty() => title.replace(['\r', '\n'], " "),
            Ok(_) => remote_id.to_string(),
            Err(err) => {
                warn!(page = %remote_id, error = %err, "could not fetch title, using the page id");
                remote_id.to_string()
            }
        };

        let records = self.fetch_tree(remote_id.as_str())?;
        let blocks = blocks_from_records(&records);
        let child_page_ids = records
            .iter()
            .filter(|record| record.is_child_page())
            .map(|record| record.id.clone())
            .collect();
        let annotations = self.fetch_annotations(&remote_id, &records);

        let document = Document {
            remote_id,
            title,
            pulled_at: Some(Utc::now()),
            child_page_ids,
            blocks,
            annotations,
        };

        let dir = output_dir.unwrap_or(&self.config.default_output_dir);
        fs::create_dir_all(dir).map_err(|source| SyncError::io(dir, source))?;
        let path = dir.join(format!("{}.md", sanitize_filename(&document.title)));
        fs::write(&path, render_document(&document))
            .map_err(|source| SyncError::io(&path, source))?;

        info!(
            page = %document.remote_id,
            blocks = document.blocks.len(),
            child_pages = document.child_page_ids.len(),
            annotations = document.annotations.len(),
            "pulled {}",
            path.display()
        );
        Ok(PullResult { document, path })
    }

    /// Compares a local document with the current remote content.
    pub fn diff(&self, path: &Path) -> Result<DiffReport, SyncError> {
        let document = self.load(path)?;
        let records = self.fetch_tree(document.remote_id.as_str())?;
        let remote = canonicalize(&encode_blocks(&blocks_from_records(&records)));
        let local = canonicalize(&document.body_markup());
        let lines = line_diff(&local, &remote);
        info!(page = %document.remote_id, changed = lines.len(), "diffed {}", path.display());
        Ok(DiffReport {
            path: path.to_path_buf(),
            remote_id: document.remote_id,
            lines,
        })
    }

    /// Reads and parses a local document. Identity errors surface here,
    /// before any remote call.
    pub(crate) fn load(&self, path: &Path) -> Result<Document, SyncError> {
        let text = fs::read_to_string(path).map_err(|source| SyncError::io(path, source))?;
        Ok(parse_document(&text)?)
    }

    /// Comment fetch failures are logged and yield no annotations.
    fn fetch_annotations(&self, page: &RemoteId, records: &[RemoteRecord]) -> Vec<Annotation> {
        let comments = match self.transport.fetch_annotations(page.as_str()) {
            Ok(comments) => comments,
            Err(err) => {
                warn!(page = %page, error = %err, "could not fetch comments");
                return Vec::new();
            }
        };

        comments
            .into_iter()
            .map(|comment| {
                let author = comment
                    .author_name
                    .filter(|name| !name.trim().is_empty())
                    .or_else(|| {
                        comment
                            .author_id
                            .as_deref()
                            .map(|id| self.names.resolve(&self.transport, id))
                    })
                    .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
                let created_at = DateTime::parse_from_rfc3339(&comment.created_at)
                    .map(|at| at.with_timezone(&Utc))
                    .unwrap_or_else(|err| {
                        debug!(comment = %comment.id, error = %err, "unparseable comment timestamp");
                        DateTime::<Utc>::UNIX_EPOCH
                    });
                let attached_to_block_index = comment.parent_block_id.as_deref().and_then(|block| {
                    records
                        .iter()
                        .position(|record| same_remote_id(&record.id, block))
                });
                Annotation {
                    author,
                    created_at,
                    body: comment.text,
                    attached_to_block_index,
                }
            })
            .collect()
    }
}

/// Remote ids compare equal with or without dashes.
pub(crate) fn same_remote_id(a: &str, b: &str) -> bool {
    a.chars()
        .filter(|c| *c != '-')
        .eq(b.chars().filter(|c| *c != '-'))
}

/// Replaces characters that are unsafe in file names and caps the length.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::transport::RawComment;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Q3: plan/notes?"), "Q3_ plan_notes_");
        assert_eq!(sanitize_filename(&"x".repeat(150)).chars().count(), 100);
    }

    #[test]
    fn test_same_remote_id_ignores_dashes() {
        assert!(same_remote_id("1234-abcd", "1234abcd"));
        assert!(!same_remote_id("1234", "1235"));
    }

    #[test]
    fn test_diff_report_sentinel() {
        let report = DiffReport {
            path: Path::new("a.md").to_path_buf(),
            remote_id: RemoteId::parse("abc").unwrap(),
            lines: vec![],
        };
        assert_eq!(report.to_string(), NO_CHANGES);
    }

    #[test]
    fn test_annotation_authors_resolved_and_attached() {
        let transport = MemoryTransport::new();
        transport.add_page("p", "Page");
        let ids = transport.add_markup("p", "First\n\nSecond");
        transport.add_user("u1", "Ada");
        transport.add_comment(
            "p",
            RawComment {
                id: "c1".into(),
                author_id: Some("u1".into()),
                created_at: "2026-01-05T10:00:00Z".into(),
                text: "nice".into(),
                parent_block_id: Some(ids[1].clone()),
                ..RawComment::default()
            },
        );
        transport.add_comment(
            "p",
            RawComment {
                id: "c2".into(),
                author_name: Some("Grace".into()),
                created_at: "not a date".into(),
                text: "hm".into(),
                ..RawComment::default()
            },
        );
        let session = Session::new(&transport);
        let records = session.fetch_tree("p").unwrap();
        let annotations =
            session.fetch_annotations(&RemoteId::parse("p").unwrap(), &records);

        assert_eq!(annotations[0].author, "Ada");
        assert_eq!(annotations[0].attached_to_block_index, Some(1));
        assert_eq!(annotations[1].author, "Grace");
        assert_eq!(annotations[1].created_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(annotations[1].attached_to_block_index, None);
    }
}
