//! Push: load, choose a strategy, execute it.
//!
//! Neither executor rolls back. When a remote call fails, the calls already
//! made stay applied and the error names the failing step.

use crate::config::SyncConfig;
use crate::error::{StepExt, SyncError, SyncStep};
use crate::mapping::{blank_payload, record_payload};
use crate::session::Session;
use crate::strategy::{
    FallbackReason, InsertionPoint, OutlineEntry, Section, Strategy, StrategyKind,
    choose_strategy,
};
use crate::transport::Transport;
use blocksync_doc::Block;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::thread;
use tracing::{debug, info, warn};

/// Outcome of a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub strategy: StrategyKind,
    /// Set when a position-preserving edit was wanted but not possible.
    pub fallback: Option<FallbackReason>,
    pub appended: usize,
    pub deleted: usize,
    pub restored: usize,
    /// Warning paragraphs written into the page.
    pub warnings: Vec<String>,
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            StrategyKind::FullReplace => "full replace",
            StrategyKind::PreservePositions => "position-preserving edit",
        };
        write!(
            f,
            "{strategy}: {} blocks appended, {} removed, {} child pages restored",
            self.appended, self.deleted, self.restored
        )?;
        if let Some(reason) = &self.fallback {
            write!(f, " (fallback: {reason})")?;
        }
        Ok(())
    }
}

impl<T: Transport> Session<T> {
    /// Pushes a local document to its remote page.
    ///
    /// The file is read and its identity checked before any remote call.
    pub fn push(&self, path: &Path) -> Result<PushReport, SyncError> {
        let document = self.load(path)?;
        let container = document.remote_id.as_str();
        let records = self.fetch_records(container)?;
        let outline: Vec<OutlineEntry> = records.iter().map(OutlineEntry::from_record).collect();
        let strategy = choose_strategy(&outline, &document.blocks);
        info!(page = container, strategy = ?strategy.kind(), "pushing {}", path.display());

        let report = match strategy {
            Strategy::FullReplace {
                blocks,
                restore,
                fallback,
                warnings,
            } => {
                if let Some(reason) = &fallback {
                    warn!(page = container, %reason, "falling back to full replace");
                }
                let appended = self.full_replace(container, &blocks, &restore)?;
                PushReport {
                    strategy: StrategyKind::FullReplace,
                    fallback,
                    appended,
                    deleted: outline
                        .iter()
                        .filter(|entry| entry.child_page.is_none())
                        .count(),
                    restored: restore.len(),
                    warnings,
                }
            }
            Strategy::PreservePositions {
                anchor,
                delete,
                sections,
            } => {
                let placeholder = records
                    .iter()
                    .find(|record| record.id == anchor)
                    .and_then(|record| blank_payload(&record.kind));
                let appended = self.preserve_positions(
                    container,
                    &anchor,
                    placeholder.as_ref(),
                    &delete,
                    &sections,
                )?;
                PushReport {
                    strategy: StrategyKind::PreservePositions,
                    fallback: None,
                    appended,
                    deleted: delete.len() + 1,
                    restored: 0,
                    warnings: Vec::new(),
                }
            }
        };
        info!(page = container, appended = report.appended, "push complete");
        Ok(report)
    }

    /// Erase, append, restore. Returns the number of appended blocks.
    fn full_replace(
        &self,
        container: &str,
        blocks: &[Block],
        restore: &[String],
    ) -> Result<usize, SyncError> {
        debug!(container, "erasing page content");
        self.transport
            .erase_container(container)
            .during(|| SyncStep::EraseContent {
                container: container.to_string(),
            })?;

        let payloads = payloads(blocks);
        let mut appender = Appender::new(&self.transport, &self.config, container);
        appender.total = appender.batches(&payloads);
        appender.append(None, &payloads)?;

        for page in restore {
            debug!(container, page = %page, "restoring child page");
            let step = || SyncStep::RestoreChildPage { page: page.clone() };
            self.transport.set_archived(page, false).during(step)?;
            self.transport.set_parent(page, container).during(step)?;
        }
        Ok(appender.appended)
    }

    /// Blank the anchor in place, delete the other ordinary blocks, splice
    /// each section after its insertion point, then drop the anchor. Returns
    /// the number of appended blocks.
    ///
    /// The remote cannot change a block's type, so the anchor is blanked with
    /// an empty payload of its own type. Anchors without text content are left
    /// as they are until removed.
    fn preserve_positions(
        &self,
        container: &str,
        anchor: &str,
        placeholder: Option<&Value>,
        delete: &[String],
        sections: &[Section],
    ) -> Result<usize, SyncError> {
        if let Some(placeholder) = placeholder {
            debug!(container, anchor, "overwriting placeholder");
            self.transport
                .update_block(anchor, placeholder)
                .during(|| SyncStep::OverwritePlaceholder {
                    block: anchor.to_string(),
                })?;
        } else {
            debug!(container, anchor, "anchor has no text content, keeping it as placeholder");
        }

        for block in delete {
            self.transport
                .delete_block(block)
                .during(|| SyncStep::DeleteBlock {
                    block: block.clone(),
                })?;
        }

        let sections: Vec<(&str, Vec<Value>)> = sections
            .iter()
            .map(|section| {
                let after = match &section.after {
                    InsertionPoint::Placeholder => anchor,
                    InsertionPoint::ChildPage(id) => id.as_str(),
                };
                (after, payloads(&section.blocks))
            })
            .collect();
        let mut appender = Appender::new(&self.transport, &self.config, container);
        appender.total = sections
            .iter()
            .map(|(_, payloads)| appender.batches(payloads))
            .sum();
        for (after, payloads) in &sections {
            appender.append(Some(after), payloads)?;
        }

        self.transport
            .delete_block(anchor)
            .during(|| SyncStep::RemovePlaceholder {
                block: anchor.to_string(),
            })?;
        Ok(appender.appended)
    }
}

fn payloads(blocks: &[Block]) -> Vec<Value> {
    blocks.iter().filter_map(record_payload).collect()
}

/// Sends payloads in batches, pausing between consecutive calls and
/// numbering batches across the whole push.
struct Appender<'a, T> {
    transport: &'a T,
    config: &'a SyncConfig,
    container: &'a str,
    batch: usize,
    total: usize,
    appended: usize,
}

impl<'a, T: Transport> Appender<'a, T> {
    fn new(transport: &'a T, config: &'a SyncConfig, container: &'a str) -> Self {
        Self {
            transport,
            config,
            container,
            batch: 0,
            total: 0,
            appended: 0,
        }
    }

    fn batches(&self, payloads: &[Value]) -> usize {
        payloads.len().div_ceil(self.config.effective_batch_size())
    }

    /// Appends after `after`, chaining each batch after the last block the
    /// previous batch created so order is kept.
    fn append(&mut self, after: Option<&str>, payloads: &[Value]) -> Result<(), SyncError> {
        let mut after = after.map(str::to_string);
        for chunk in payloads.chunks(self.config.effective_batch_size()) {
            if self.batch > 0 && !self.config.throttle.is_zero() {
                thread::sleep(self.config.throttle);
            }
            self.batch += 1;
            let (batch, total) = (self.batch, self.total);
            debug!(
                container = self.container,
                batch,
                total,
                size = chunk.len(),
                "appending batch"
            );
            let ids = self
                .transport
                .append_children(self.container, after.as_deref(), chunk)
                .during(|| SyncStep::AppendBatch { batch, total })?;
            self.appended += chunk.len();
            if after.is_some()
                && let Some(last) = ids.last()
            {
                after = Some(last.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> PushReport {
        PushReport {
            strategy: StrategyKind::FullReplace,
            fallback: Some(FallbackReason::NoAnchorBlock),
            appended: 3,
            deleted: 1,
            restored: 2,
            warnings: vec!["w".into()],
        }
    }

    #[test]
    fn test_report_display() {
        assert_eq!(
            report().to_string(),
            "full replace: 3 blocks appended, 1 removed, 2 child pages restored \
             (fallback: the remote page has no ordinary block to anchor on)"
        );
    }

    #[test]
    fn test_report_json() {
        assert_eq!(
            serde_json::to_value(report()).unwrap(),
            json!({
                "strategy": "full_replace",
                "fallback": { "reason": "no_anchor_block" },
                "appended": 3,
                "deleted": 1,
                "restored": 2,
                "warnings": ["w"],
            })
        );
    }
}
