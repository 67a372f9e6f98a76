//! Sync protocol between local markup documents and a remote block tree.
//!
//! A [`Session`] wraps a [`Transport`] and runs the three operations:
//!
//! - [`Session::pull`] fetches a page and writes it as a markup document.
//! - [`Session::push`] replaces a page's content with a local document,
//!   keeping child pages in place when it can.
//! - [`Session::diff`] compares a local document with the remote content.
//!
//! [`MemoryTransport`] is an in-memory remote used by the tests.

pub mod config;
pub mod error;
pub mod mapping;
pub mod memory;
pub mod names;
pub mod push;
pub mod session;
pub mod strategy;
pub mod transport;

pub use config::{MAX_BATCH_SIZE, SyncConfig};
pub use error::{SyncError, SyncStep, TransportError};
pub use mapping::{block_from_record, blocks_from_records, record_payload};
pub use memory::{Call, CallKind, MemoryBlock, MemoryTransport};
pub use names::{NameCache, UNKNOWN_AUTHOR};
pub use push::PushReport;
pub use session::{DiffReport, NO_CHANGES, PullResult, Session, sanitize_filename};
pub use strategy::{
    FallbackReason, InsertionPoint, OutlineEntry, Section, Strategy, StrategyKind,
    choose_strategy, displacement_warning,
};
pub use transport::{ChildrenPage, RawComment, RemoteRecord, Transport};
