use blocksync_doc::DocumentError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("remote returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed remote response: {0}")]
    Decode(String),
    #[error("remote object not found: {0}")]
    NotFound(String),
}

/// Protocol step during which a remote call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStep {
    FetchBlocks { container: String },
    EraseContent { container: String },
    AppendBatch { batch: usize, total: usize },
    OverwritePlaceholder { block: String },
    DeleteBlock { block: String },
    RemovePlaceholder { block: String },
    RestoreChildPage { page: String },
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchBlocks { container } => write!(f, "fetching blocks of {container}"),
            Self::EraseContent { container } => write!(f, "erasing content of {container}"),
            Self::AppendBatch { batch, total } => write!(f, "appending batch {batch}/{total}"),
            Self::OverwritePlaceholder { block } => {
                write!(f, "overwriting placeholder block {block}")
            }
            Self::DeleteBlock { block } => write!(f, "deleting block {block}"),
            Self::RemovePlaceholder { block } => write!(f, "removing placeholder block {block}"),
            Self::RestoreChildPage { page } => write!(f, "restoring child page {page}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    /// Remote calls completed before the failing one are not undone.
    #[error("{step} failed: {source}")]
    Transport {
        step: SyncStep,
        source: TransportError,
    },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The step that failed, for transport errors.
    pub fn step(&self) -> Option<&SyncStep> {
        match self {
            Self::Transport { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Attaches the protocol step to a transport result.
pub(crate) trait StepExt<T> {
    fn during(self, step: impl FnOnce() -> SyncStep) -> Result<T, SyncError>;
}

impl<T> StepExt<T> for Result<T, TransportError> {
    fn during(self, step: impl FnOnce() -> SyncStep) -> Result<T, SyncError> {
        self.map_err(|source| SyncError::Transport {
            step: step(),
            source,
        })
    }
}
