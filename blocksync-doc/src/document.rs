//! Document model: identity header, block body and annotation section.
//!
//! A persisted document looks like:
//!
//! ```text
//! ---
//! remote_id: 0123abcd...
//! title: Weekly notes
//! pulled_at: 2026-01-05T10:00:00+00:00
//! child_pages:
//!   - 4567ef...
//! ---
//!
//! # Body markup
//!
//! ---
//!
//! ## Comments
//!
//! > **Ada** *(Jan 5, 2026)*: Looks good
//! ```
//!
//! Everything here is a pure function over strings; reading and writing files
//! is the caller's business.

use crate::block::{Block, decode_blocks, encode_blocks};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Line delimiting the identity header.
pub const HEADER_SENTINEL: &str = "---";
/// Heading that introduces the annotation section.
pub const ANNOTATION_HEADING: &str = "## Comments";

const REMOTE_ID_KEY: &str = "remote_id";
const LEGACY_REMOTE_ID_KEY: &str = "notion_id";
const TITLE_KEY: &str = "title";
const PULLED_AT_KEY: &str = "pulled_at";
const CHILD_PAGES_KEY: &str = "child_pages";
const ANNOTATION_DATE_FORMAT: &str = "%b %-d, %Y";
const ANNOTATION_DATE_PARSE_FORMAT: &str = "%b %d, %Y";
const REMOTE_ID_HEX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document has no remote id in its header")]
    MissingRemoteId,
    #[error("invalid remote id: {0:?}")]
    InvalidRemoteId(String),
    #[error("document header is not terminated by a '---' line")]
    UnterminatedHeader,
}

/// Normalized identifier of a remote page: separators stripped, ASCII
/// alphanumeric only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemoteId(String);

impl RemoteId {
    /// Accepts a bare id (with or without dashes) or a page URL whose last
    /// path segment ends in the 32-character hex id.
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DocumentError::MissingRemoteId);
        }
        let segment = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(trimmed);
        let compact: String = segment.chars().filter(|c| *c != '-').collect();

        let id = if compact.len() > REMOTE_ID_HEX_LEN && compact.is_char_boundary(compact.len() - REMOTE_ID_HEX_LEN) {
            let tail = &compact[compact.len() - REMOTE_ID_HEX_LEN..];
            if tail.chars().all(|c| c.is_ascii_hexdigit()) {
                tail.to_string()
            } else {
                compact
            }
        } else {
            compact
        };

        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DocumentError::InvalidRemoteId(raw.to_string()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A remote comment. Read-only locally: it is rendered into the annotation
/// section on pull and never pushed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub body: String,
    /// Index of the top-level remote block the comment is attached to, when
    /// it is not a page-level comment.
    pub attached_to_block_index: Option<usize>,
}

impl Annotation {
    /// Renders the annotation as an attributed quote line. Line breaks in
    /// the body are folded into spaces so the line parses back.
    pub fn render(&self) -> String {
        let body: Vec<&str> = self
            .body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        format!(
            "> **{}** *({})*: {}",
            self.author,
            self.created_at.format(ANNOTATION_DATE_FORMAT),
            body.join(" ")
        )
    }

    /// Parses a line produced by [`Annotation::render`]. Only the date
    /// survives rendering, so `created_at` comes back at midnight UTC.
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix("> **")?;
        let (author, rest) = rest.split_once("** *(")?;
        let (date, body) = rest.split_once(")*: ").or_else(|| {
            rest.strip_suffix(")*:")
                .map(|date| (date, ""))
        })?;
        let date = NaiveDate::parse_from_str(date, ANNOTATION_DATE_PARSE_FORMAT).ok()?;
        Some(Self {
            author: author.to_string(),
            created_at: date.and_hms_opt(0, 0, 0)?.and_utc(),
            body: body.to_string(),
            attached_to_block_index: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub remote_id: RemoteId,
    pub title: String,
    pub pulled_at: Option<DateTime<Utc>>,
    /// Every child page the remote page had at pull time, in remote order.
    pub child_page_ids: Vec<String>,
    pub blocks: Vec<Block>,
    pub annotations: Vec<Annotation>,
}

impl Document {
    pub fn new(remote_id: RemoteId, title: impl Into<String>) -> Self {
        Self {
            remote_id,
            title: title.into(),
            pulled_at: None,
            child_page_ids: Vec::new(),
            blocks: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Body markup without header or annotation section.
    pub fn body_markup(&self) -> String {
        encode_blocks(&self.blocks)
    }
}

#[derive(Debug, Default)]
struct Header {
    remote_id: Option<String>,
    title: Option<String>,
    pulled_at: Option<DateTime<Utc>>,
    child_pages: Vec<String>,
}

/// Parses a persisted document.
///
/// The header must carry a remote id; its absence is an error rather than a
/// default because nothing can be pushed or diffed without it. The body is
/// decoded leniently.
pub fn parse_document(text: &str) -> Result<Document, DocumentError> {
    let (header, body) = split_header(text)?;
    let header = header.ok_or(DocumentError::MissingRemoteId)?;
    let raw_id = header.remote_id.ok_or(DocumentError::MissingRemoteId)?;
    let remote_id = RemoteId::parse(&raw_id)?;

    let (content, section) = extract_annotation_section(body);
    let annotations = section
        .map(|section| section.lines().filter_map(Annotation::parse_line).collect())
        .unwrap_or_default();

    Ok(Document {
        remote_id,
        title: header.title.unwrap_or_default(),
        pulled_at: header.pulled_at,
        child_page_ids: header.child_pages,
        blocks: decode_blocks(content),
        annotations,
    })
}

/// Renders a document: header, blank line, body, optional annotation
/// section.
pub fn render_document(document: &Document) -> String {
    let mut output = String::new();
    output.push_str(HEADER_SENTINEL);
    output.push('\n');
    output.push_str(&format!("{REMOTE_ID_KEY}: {}\n", document.remote_id));
    output.push_str(&format!("{TITLE_KEY}: {}\n", document.title));
    if let Some(pulled_at) = document.pulled_at {
        output.push_str(&format!("{PULLED_AT_KEY}: {}\n", pulled_at.to_rfc3339()));
    }
    if !document.child_page_ids.is_empty() {
        output.push_str(&format!("{CHILD_PAGES_KEY}:\n"));
        for id in &document.child_page_ids {
            output.push_str(&format!("  - {id}\n"));
        }
    }
    output.push_str(HEADER_SENTINEL);
    output.push_str("\n\n");
    output.push_str(&attach_annotation_section(
        &document.body_markup(),
        &document.annotations,
    ));
    output
}

fn split_header(text: &str) -> Result<(Option<Header>, &str), DocumentError> {
    let Some(after_open) = strip_sentinel_line(text) else {
        return Ok((None, text));
    };

    let mut header = Header::default();
    let mut in_child_pages = false;
    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        offset += line.len();
        let line = line.trim_end_matches(['\n', '\r']);
        if line == HEADER_SENTINEL {
            let body = &after_open[offset..];
            let body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            return Ok((Some(header), body));
        }

        if in_child_pages && let Some(item) = line.trim_start().strip_prefix("- ") {
            let item = item.trim();
            if !item.is_empty() {
                header.child_pages.push(item.to_string());
            }
            continue;
        }
        in_child_pages = false;

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            REMOTE_ID_KEY | LEGACY_REMOTE_ID_KEY if !value.is_empty() => {
                header.remote_id = Some(value.to_string());
            }
            TITLE_KEY => header.title = Some(value.to_string()),
            PULLED_AT_KEY => {
                header.pulled_at = DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|at| at.with_timezone(&Utc));
            }
            CHILD_PAGES_KEY => in_child_pages = true,
            _ => {}
        }
    }
    Err(DocumentError::UnterminatedHeader)
}

fn strip_sentinel_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix(HEADER_SENTINEL)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Splits body markup into content and the trailing annotation section.
///
/// The section is the trailing `---` divider, a `## Comments` heading and
/// one or more annotation lines, as written by
/// [`attach_annotation_section`]. Anything else, including a `## Comments`
/// heading followed by ordinary text, stays in the body. Returns the body
/// unchanged and `None` when there is no section.
pub fn extract_annotation_section(body: &str) -> (&str, Option<&str>) {
    let mut heading: Option<(usize, usize)> = None;
    let mut last_divider: Option<usize> = None;
    let mut divider_before_heading = None;
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == ANNOTATION_HEADING {
            heading = Some((offset, offset + line.len()));
            divider_before_heading = last_divider;
        } else if trimmed == HEADER_SENTINEL {
            last_divider = Some(offset);
        } else if !trimmed.is_empty() {
            last_divider = None;
        }
        offset += line.len();
    }

    let Some((_, end)) = heading else {
        return (body, None);
    };
    let Some(content_end) = divider_before_heading else {
        return (body, None);
    };
    let section = body[end..].trim();
    let mut lines = section.lines().filter(|line| !line.trim().is_empty()).peekable();
    if lines.peek().is_none() || !lines.all(|line| Annotation::parse_line(line).is_some()) {
        return (body, None);
    }
    (body[..content_end].trim_end(), Some(section))
}

/// Appends the annotation section to body markup. With no annotations the
/// body is returned unchanged.
pub fn attach_annotation_section(body: &str, annotations: &[Annotation]) -> String {
    let mut output = body.to_string();
    if annotations.is_empty() {
        return output;
    }
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output.push_str(&format!("\n{HEADER_SENTINEL}\n\n{ANNOTATION_HEADING}\n\n"));
    for annotation in annotations {
        output.push_str(&annotation.render());
        output.push_str("\n\n");
    }
    output
}
