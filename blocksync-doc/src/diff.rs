//! Positional line comparison between local and remote markup.

use crate::block::{decode_blocks, encode_blocks};
use std::fmt;

/// One differing line. Removed lines come from the remote side, added lines
/// from the local side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Removed(String),
    Added(String),
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removed(line) => write!(f, "-{line}"),
            Self::Added(line) => write!(f, "+{line}"),
        }
    }
}

/// Compares line `i` of each side. Where they differ the remote line is
/// reported as removed and the local line as added; a side past its end
/// contributes nothing. This is not an LCS diff, so an inserted line shifts
/// every line after it.
pub fn line_diff(local: &str, remote: &str) -> Vec<DiffLine> {
    let local: Vec<&str> = local.lines().collect();
    let remote: Vec<&str> = remote.lines().collect();
    let mut output = Vec::new();
    for index in 0..local.len().max(remote.len()) {
        let (ours, theirs) = (local.get(index), remote.get(index));
        if ours == theirs {
            continue;
        }
        if let Some(theirs) = theirs {
            output.push(DiffLine::Removed((*theirs).to_string()));
        }
        if let Some(ours) = ours {
            output.push(DiffLine::Added((*ours).to_string()));
        }
    }
    output
}

/// Normalizes markup by decoding and re-encoding it, so that formatting
/// differences the codec does not preserve never show up as changes.
pub fn canonicalize(markup: &str) -> String {
    encode_blocks(&decode_blocks(markup)).trim().to_string()
}
