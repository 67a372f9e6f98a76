//! blocksync: two-way sync between markdown files and remote block trees.
//!
//! This crate re-exports the workspace libraries:
//!
//! - **Document codecs** ([`doc`]) - inline spans, blocks, the identity
//!   header and the comment section, line diffs
//! - **Sync protocol** ([`sync`]) - pull, push and diff over a [`Transport`],
//!   with an in-memory remote for tests
//!
//! The `blocksync` binary in `blocksync-cli` wires these to the Notion API.
//!
//! # Quick Start
//!
//! ```rust
//! use blocksync::{MemoryTransport, Session};
//!
//! let remote = MemoryTransport::new();
//! remote.add_page("abc123", "Notes");
//! remote.add_markup("abc123", "# Notes\n\nHello");
//!
//! let dir = std::env::temp_dir().join("blocksync-doctest");
//! let session = Session::new(&remote);
//! let pulled = session.pull("abc123", Some(&dir)).unwrap();
//! assert_eq!(pulled.document.body_markup(), "# Notes\n\nHello\n");
//! ```

pub use blocksync_doc as doc;
pub use blocksync_sync as sync;

pub use blocksync_doc::{
    Annotation, Block, Document, DocumentError, RemoteId, TextSpan, decode_blocks, encode_blocks,
    parse_document, render_document,
};
pub use blocksync_sync::{
    DiffReport, MemoryTransport, PullResult, PushReport, Session, SyncConfig, SyncError,
    Transport, TransportError,
};
