//! Markdown codec and document model for block-tree page sync.
//!
//! - [`inline`] converts between styled text spans and inline markup.
//! - [`block`] splits markup into typed blocks and renders them back.
//! - [`document`] adds the identity header and the annotation section.
//! - [`diff`] compares canonical markup line by line.
//!
//! Every function in this crate is pure and infallible except
//! [`parse_document`], which requires a remote id in the header.
//!
//! ```rust
//! use blocksync_doc::{decode_blocks, encode_blocks};
//!
//! let blocks = decode_blocks("# Hello\n\n- one\n- two");
//! assert_eq!(encode_blocks(&blocks), "# Hello\n\n- one\n- two\n");
//! ```

pub mod block;
pub mod diff;
pub mod document;
pub mod inline;

pub use block::{
    Block, CHILD_PAGE_MARKER, HeadingLevel, Table, decode_blocks, encode_blocks,
    mark_trailing_child_pages, renumber,
};
pub use diff::{DiffLine, canonicalize, line_diff};
pub use document::{
    Annotation, Document, DocumentError, RemoteId, attach_annotation_section,
    extract_annotation_section, parse_document, render_document,
};
pub use inline::{Annotations, TextSpan, decode_inline, encode_inline, plain_text};
